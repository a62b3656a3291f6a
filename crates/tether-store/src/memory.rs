//! In-memory backend using DashMap
//!
//! Doubles as the substitutable fake for coordinator tests and as a
//! lightweight backend for embedders that do not need durability.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tether_core::{
    ActorDirectory, ActorId, CounterStore, Edge, EdgeStore, Result, TargetId, TetherError,
    ME_ALIAS,
};

/// Edge set plus per-target counters for one relation kind.
///
/// Targets must be registered via [`insert_target`] before they can be
/// linked; an unregistered target behaves like a deleted entity and
/// yields `TargetNotFound` from the counter side.
///
/// [`insert_target`]: MemoryRelationStore::insert_target
#[derive(Clone, Default)]
pub struct MemoryRelationStore {
    edges: Arc<DashMap<(ActorId, TargetId), Edge>>,
    counters: Arc<DashMap<TargetId, u64>>,
}

impl MemoryRelationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target entity with a zeroed counter
    pub fn insert_target(&self, target: TargetId) {
        self.counters.entry(target).or_insert(0);
    }

    /// Drop a target entity (its counter record). Existing edges are
    /// left in place so partial-state scenarios can be exercised.
    pub fn remove_target(&self, target: &TargetId) {
        self.counters.remove(target);
    }
}

#[async_trait]
impl EdgeStore for MemoryRelationStore {
    async fn exists(&self, actor: &ActorId, target: &TargetId) -> Result<bool> {
        Ok(self
            .edges
            .contains_key(&(actor.clone(), target.clone())))
    }

    async fn count_by_target(&self, target: &TargetId) -> Result<u64> {
        Ok(self
            .edges
            .iter()
            .filter(|entry| &entry.key().1 == target)
            .count() as u64)
    }

    async fn create(&self, actor: &ActorId, target: &TargetId) -> Result<Edge> {
        let key = (actor.clone(), target.clone());
        match self.edges.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(TetherError::DuplicateEdge),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let edge = Edge::new(actor.clone(), target.clone());
                slot.insert(edge.clone());
                Ok(edge)
            }
        }
    }

    async fn remove(&self, actor: &ActorId, target: &TargetId) -> Result<bool> {
        Ok(self
            .edges
            .remove(&(actor.clone(), target.clone()))
            .is_some())
    }

    async fn list_by_actor(&self, actor: &ActorId) -> Result<Vec<Edge>> {
        Ok(self
            .edges
            .iter()
            .filter(|entry| &entry.key().0 == actor)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn list_by_target(&self, target: &TargetId) -> Result<Vec<Edge>> {
        Ok(self
            .edges
            .iter()
            .filter(|entry| &entry.key().1 == target)
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[async_trait]
impl CounterStore for MemoryRelationStore {
    async fn read_count(&self, target: &TargetId) -> Result<u64> {
        self.counters
            .get(target)
            .map(|entry| *entry)
            .ok_or_else(|| TetherError::TargetNotFound(target.clone()))
    }

    async fn write_count(&self, target: &TargetId, value: u64) -> Result<()> {
        match self.counters.get_mut(target) {
            Some(mut entry) => {
                *entry = value;
                Ok(())
            }
            None => Err(TetherError::TargetNotFound(target.clone())),
        }
    }

    async fn apply_delta(&self, target: &TargetId, delta: i64) -> Result<u64> {
        // get_mut holds the shard write lock across the read-modify-write,
        // so concurrent deltas on the same target serialize here.
        match self.counters.get_mut(target) {
            Some(mut entry) => {
                let next = if delta < 0 {
                    entry.saturating_sub(delta.unsigned_abs())
                } else {
                    *entry + delta as u64
                };
                *entry = next;
                Ok(next)
            }
            None => Err(TetherError::TargetNotFound(target.clone())),
        }
    }
}

/// In-memory actor directory: a set of known actor ids plus the
/// `"me"` alias resolution.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
    actors: Arc<DashMap<ActorId, ()>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_actor(&self, actor: ActorId) {
        self.actors.insert(actor, ());
    }
}

#[async_trait]
impl ActorDirectory for MemoryDirectory {
    async fn resolve(&self, raw: &str, current: Option<&ActorId>) -> Result<ActorId> {
        if raw == ME_ALIAS {
            return current
                .cloned()
                .ok_or_else(|| TetherError::ActorNotFound(raw.to_string()));
        }
        let actor = ActorId::new(raw);
        if self.actors.contains_key(&actor) {
            Ok(actor)
        } else {
            Err(TetherError::ActorNotFound(raw.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(actor: &str, target: &str) -> (ActorId, TargetId) {
        (ActorId::new(actor), TargetId::new(target))
    }

    #[tokio::test]
    async fn test_edge_lifecycle() {
        let store = MemoryRelationStore::new();
        let (alice, item) = ids("alice", "item-1");

        assert!(!store.exists(&alice, &item).await.unwrap());
        store.create(&alice, &item).await.unwrap();
        assert!(store.exists(&alice, &item).await.unwrap());
        assert_eq!(store.count_by_target(&item).await.unwrap(), 1);

        assert!(store.remove(&alice, &item).await.unwrap());
        assert!(!store.exists(&alice, &item).await.unwrap());
        // Removing again is a no-op, not an error
        assert!(!store.remove(&alice, &item).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryRelationStore::new();
        let (alice, item) = ids("alice", "item-1");

        store.create(&alice, &item).await.unwrap();
        let err = store.create(&alice, &item).await.unwrap_err();
        assert!(matches!(err, TetherError::DuplicateEdge));
        assert_eq!(store.count_by_target(&item).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listing_by_either_side() {
        let store = MemoryRelationStore::new();
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");
        let item = TargetId::new("item-1");
        let other = TargetId::new("item-2");

        store.create(&alice, &item).await.unwrap();
        store.create(&bob, &item).await.unwrap();
        store.create(&alice, &other).await.unwrap();

        assert_eq!(store.list_by_actor(&alice).await.unwrap().len(), 2);
        assert_eq!(store.list_by_target(&item).await.unwrap().len(), 2);
        assert_eq!(store.list_by_target(&other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counter_floor_and_missing_target() {
        let store = MemoryRelationStore::new();
        let item = TargetId::new("item-1");

        let err = store.read_count(&item).await.unwrap_err();
        assert!(matches!(err, TetherError::TargetNotFound(_)));

        store.insert_target(item.clone());
        assert_eq!(store.read_count(&item).await.unwrap(), 0);
        assert_eq!(store.apply_delta(&item, 2).await.unwrap(), 2);
        // Floored at zero, never negative
        assert_eq!(store.apply_delta(&item, -5).await.unwrap(), 0);

        store.write_count(&item, 7).await.unwrap();
        assert_eq!(store.read_count(&item).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_directory_me_alias() {
        let dir = MemoryDirectory::new();
        let alice = ActorId::new("alice");
        dir.insert_actor(alice.clone());

        assert_eq!(dir.resolve("alice", None).await.unwrap(), alice);
        assert_eq!(dir.resolve("me", Some(&alice)).await.unwrap(), alice);
        assert!(matches!(
            dir.resolve("me", None).await.unwrap_err(),
            TetherError::ActorNotFound(_)
        ));
        assert!(matches!(
            dir.resolve("nobody", None).await.unwrap_err(),
            TetherError::ActorNotFound(_)
        ));
    }
}
