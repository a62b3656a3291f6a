//! Toggle coordinator
//!
//! Flips the relationship state for an (actor, target) pair and keeps
//! the target's denormalized counter in step with the edge set. The
//! engine holds no relationship state of its own, only a transient
//! per-pair lock map; the stores are injected trait objects so
//! backends can be swapped.

use crate::db::Database;
use dashmap::DashMap;
use std::sync::Arc;
use tether_core::{
    ActorId, CounterStore, EdgeStore, RelationKind, Result, TargetId, TetherError, ToggleOutcome,
};
use tokio::sync::Mutex;
use tracing::{debug, error};

/// How the coordinator writes the denormalized counter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CounterMode {
    /// Atomic increment/decrement at the storage layer. Race-free: two
    /// concurrent toggles cannot lose each other's update.
    #[default]
    AtomicDelta,

    /// Read the counter up front, write back `value ± 1`. Mirrors the
    /// source system's observable behavior and is kept only for
    /// compatibility: concurrent toggles on the same target can both
    /// write from the same stale read and lose an update.
    ReadThenWrite,
}

impl CounterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterMode::AtomicDelta => "atomic",
            CounterMode::ReadThenWrite => "read-then-write",
        }
    }
}

impl std::str::FromStr for CounterMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "atomic" => Ok(CounterMode::AtomicDelta),
            "read-then-write" => Ok(CounterMode::ReadThenWrite),
            other => Err(format!("unknown counter mode: {other}")),
        }
    }
}

impl std::fmt::Display for CounterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coordinator for one relation kind.
///
/// `toggle` is the only operation that transitions an (actor, target)
/// pair between Linked and Unlinked, and the only writer of the
/// target's denormalized counter.
#[derive(Clone)]
pub struct RelationEngine {
    kind: RelationKind,
    edges: Arc<dyn EdgeStore>,
    counters: Arc<dyn CounterStore>,
    mode: CounterMode,
    // Serializes in-flight toggles per (actor, target) pair. The
    // counter delta is atomic on its own, but without this a same-pair
    // unlink could apply its decrement before the paired increment and
    // the zero floor would skew the counter.
    locks: Arc<DashMap<(ActorId, TargetId), Arc<Mutex<()>>>>,
}

impl RelationEngine {
    pub fn new(
        kind: RelationKind,
        edges: Arc<dyn EdgeStore>,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        Self {
            kind,
            edges,
            counters,
            mode: CounterMode::default(),
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn with_mode(mut self, mode: CounterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn for_kind(db: &Database, kind: RelationKind) -> Self {
        Self::new(
            kind,
            Arc::new(db.edge_store(kind)),
            Arc::new(db.counter_store(kind)),
        )
    }

    pub fn bookmarks(db: &Database) -> Self {
        Self::for_kind(db, RelationKind::Bookmark)
    }

    pub fn dislikes(db: &Database) -> Self {
        Self::for_kind(db, RelationKind::Dislike)
    }

    pub fn follows(db: &Database) -> Self {
        Self::for_kind(db, RelationKind::Follow)
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    /// Flip the relationship state for the pair.
    ///
    /// Linked pairs are unlinked and vice versa; the counter moves by
    /// one in step with the edge mutation. Toggles on the same pair
    /// serialize in-process; a toggle that still loses a race (e.g. to
    /// another process sharing the database) reports the winner's
    /// state and leaves the counter to the winner, so a single edge
    /// transition is never counted twice.
    pub async fn toggle(&self, actor: &ActorId, target: &TargetId) -> Result<ToggleOutcome> {
        let key = (actor.clone(), target.clone());
        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let outcome = {
            let _guard = lock.lock().await;
            self.toggle_locked(actor, target).await
        };
        drop(lock);
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        outcome
    }

    async fn toggle_locked(&self, actor: &ActorId, target: &TargetId) -> Result<ToggleOutcome> {
        // Existence gate: a missing target fails here, before any edge
        // mutation. Also the stale read the legacy mode writes from.
        let current = self.counters.read_count(target).await?;
        let linked = self.edges.exists(actor, target).await?;

        if linked {
            if !self.edges.remove(actor, target).await? {
                // Concurrent unlink won between the check and the
                // delete; its toggle owns the counter transition.
                debug!(kind = %self.kind, %actor, %target, "edge already removed");
                let count = self.counters.read_count(target).await?;
                return Ok(ToggleOutcome::Unlinked(count));
            }
            let count = self.update_counter(actor, target, current, -1).await?;
            debug!(kind = %self.kind, %actor, %target, count, "unlinked");
            Ok(ToggleOutcome::Unlinked(count))
        } else {
            match self.edges.create(actor, target).await {
                Ok(_) => {}
                Err(TetherError::DuplicateEdge) => {
                    // Concurrent link won; the edge the caller asked
                    // for is in place, so this is a success.
                    debug!(kind = %self.kind, %actor, %target, "edge already present");
                    let count = self.counters.read_count(target).await?;
                    return Ok(ToggleOutcome::Linked(count));
                }
                Err(err) => return Err(err),
            }
            let count = self.update_counter(actor, target, current, 1).await?;
            debug!(kind = %self.kind, %actor, %target, count, "linked");
            Ok(ToggleOutcome::Linked(count))
        }
    }

    /// Targets the actor is currently linked to
    pub async fn related_targets(&self, actor: &ActorId) -> Result<Vec<TargetId>> {
        Ok(self
            .edges
            .list_by_actor(actor)
            .await?
            .into_iter()
            .map(|edge| edge.target)
            .collect())
    }

    /// Actors currently linked to the target
    pub async fn related_actors(&self, target: &TargetId) -> Result<Vec<ActorId>> {
        Ok(self
            .edges
            .list_by_target(target)
            .await?
            .into_iter()
            .map(|edge| edge.actor)
            .collect())
    }

    /// Denormalized counter as stored on the target entity
    pub async fn counter(&self, target: &TargetId) -> Result<u64> {
        self.counters.read_count(target).await
    }

    /// True edge count, recomputed from the edge store. Matches
    /// [`counter`] whenever no toggle is in flight; used for
    /// reconciliation.
    ///
    /// [`counter`]: RelationEngine::counter
    pub async fn recount(&self, target: &TargetId) -> Result<u64> {
        self.edges.count_by_target(target).await
    }

    async fn update_counter(
        &self,
        actor: &ActorId,
        target: &TargetId,
        stale: u64,
        delta: i64,
    ) -> Result<u64> {
        let result = match self.mode {
            CounterMode::AtomicDelta => self.counters.apply_delta(target, delta).await,
            CounterMode::ReadThenWrite => {
                let next = if delta < 0 {
                    stale.saturating_sub(1)
                } else {
                    stale + 1
                };
                self.counters.write_count(target, next).await.map(|_| next)
            }
        };

        // The edge mutation already happened; the edge store is the
        // source of truth for linkage, so a failure here must surface
        // loudly rather than roll anything back.
        match result {
            Ok(count) => Ok(count),
            Err(TetherError::TargetNotFound(t)) => {
                error!(
                    kind = %self.kind, %actor, %target,
                    "target deleted mid-toggle, counter not updated"
                );
                Err(TetherError::TargetNotFound(t))
            }
            Err(err) => {
                error!(
                    kind = %self.kind, %actor, %target, %err,
                    "edge mutated but counter write failed"
                );
                Err(TetherError::PartialFailure {
                    target: target.clone(),
                    detail: err.to_string(),
                })
            }
        }
    }
}
