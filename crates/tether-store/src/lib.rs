//! Tether - Storage backends and toggle coordinator
//!
//! Uses SQLite (embedded) for persistence and DashMap for the
//! in-memory backend. The coordinator ([`RelationEngine`]) takes the
//! stores as injected trait objects, so either backend (or a caller's
//! own) plugs in unchanged.

pub mod config;
pub mod db;
pub mod engine;
pub mod memory;

pub use config::StoreConfig;
pub use db::{Database, SqliteCounterStore, SqliteDirectory, SqliteEdgeStore};
pub use engine::{CounterMode, RelationEngine};
pub use memory::{MemoryDirectory, MemoryRelationStore};
