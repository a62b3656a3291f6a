//! Tether - Core Library
//!
//! Core types, error taxonomy, and store traits for toggling
//! actor-to-target relationships (bookmarks, dislikes, follows)
//! with a denormalized counter on the target entity.

pub mod error;
pub mod store;
pub mod types;

pub use error::*;
pub use store::*;
pub use types::*;
