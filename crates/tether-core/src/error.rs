//! Error types for Tether

use crate::types::TargetId;
use thiserror::Error;

/// Main error type for Tether
#[derive(Error, Debug)]
pub enum TetherError {
    /// An edge for the (actor, target) pair already exists. Benign
    /// during a toggle: the link the caller asked for is in place.
    #[error("edge already exists for this actor/target pair")]
    DuplicateEdge,

    #[error("target not found: {0}")]
    TargetNotFound(TargetId),

    #[error("actor not found: {0}")]
    ActorNotFound(String),

    /// Transient persistence-layer failure; the caller may retry the
    /// whole toggle.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The edge store and the counter store disagree after a fault
    /// (edge mutated, counter write failed). Surfaced so reconciliation
    /// can be triggered; never silently swallowed.
    #[error("edge and counter stores disagree for target {target}: {detail}")]
    PartialFailure { target: TargetId, detail: String },
}

impl TetherError {
    /// Wrap an arbitrary persistence-layer failure.
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        TetherError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TetherError>;
