//! Store traits: the seams between the toggle coordinator and the
//! persistence layer. Backends implement these so the coordinator can
//! run against SQLite in production and in-memory stores in tests.

use crate::error::Result;
use crate::types::{ActorId, Edge, TargetId};
use async_trait::async_trait;

/// Raw identifier the caller may pass in place of a concrete actor id,
/// standing for the authenticated caller.
pub const ME_ALIAS: &str = "me";

/// Persisted set of (actor, target) edges for one relation kind.
///
/// Uniqueness per pair is the store's invariant: `create` must fail
/// with [`TetherError::DuplicateEdge`] rather than overwrite.
///
/// [`TetherError::DuplicateEdge`]: crate::error::TetherError::DuplicateEdge
#[async_trait]
pub trait EdgeStore: Send + Sync {
    /// True iff an edge for the pair is currently persisted
    async fn exists(&self, actor: &ActorId, target: &TargetId) -> Result<bool>;

    /// Number of edges currently referencing `target`. This recount is
    /// the source of truth the denormalized counter mirrors.
    async fn count_by_target(&self, target: &TargetId) -> Result<u64>;

    /// Insert an edge; fails if the pair already exists
    async fn create(&self, actor: &ActorId, target: &TargetId) -> Result<Edge>;

    /// Delete the edge for the pair if present. Returns whether an edge
    /// was actually removed; an absent pair is a no-op, not an error.
    async fn remove(&self, actor: &ActorId, target: &TargetId) -> Result<bool>;

    /// All edges created by `actor`
    async fn list_by_actor(&self, actor: &ActorId) -> Result<Vec<Edge>>;

    /// All edges referencing `target`
    async fn list_by_target(&self, target: &TargetId) -> Result<Vec<Edge>>;
}

/// View over the target entity's denormalized relation counter.
///
/// The counter is a cached mirror of the edge count, owned by the
/// toggle coordinator; other subsystems only read it.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current counter value; `TargetNotFound` if the target entity
    /// does not exist.
    async fn read_count(&self, target: &TargetId) -> Result<u64>;

    /// Overwrite the counter. Legacy read-then-write path; subject to
    /// lost updates under concurrency (see [`apply_delta`]).
    ///
    /// [`apply_delta`]: CounterStore::apply_delta
    async fn write_count(&self, target: &TargetId, value: u64) -> Result<()>;

    /// Atomically add `delta` to the counter, flooring at zero, and
    /// return the new value. This is the race-free path: the
    /// read-modify-write happens inside the storage layer.
    async fn apply_delta(&self, target: &TargetId, delta: i64) -> Result<u64>;
}

/// Existence oracle for actors, consumed by callers before they invoke
/// the coordinator: resolves raw identifiers (including the `"me"`
/// alias for the authenticated caller) to canonical actor ids.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Resolve `raw` to a canonical actor id. The `"me"` alias maps to
    /// `current`; `ActorNotFound` if there is no current caller or the
    /// concrete id does not exist.
    async fn resolve(&self, raw: &str, current: Option<&ActorId>) -> Result<ActorId>;
}
