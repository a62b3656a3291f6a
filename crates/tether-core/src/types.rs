//! Core type definitions for Tether

use serde::{Deserialize, Serialize};

/// Identifier of the acting side of a relationship (the user who
/// bookmarks, dislikes, or follows). Opaque string, treated as a
/// primary key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the target side of a relationship (the item being
/// bookmarked/disliked, or the user being followed).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One persisted relationship instance. At most one edge exists per
/// (actor, target) pair within a relation kind; edges are created by a
/// toggle-on and deleted by a toggle-off, never updated in place.
///
/// For [`RelationKind::Follow`] the edge is directional: `target` is
/// the user being followed and `actor` the user who follows. A
/// following B and B following A are distinct edges.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub actor: ActorId,
    pub target: TargetId,
}

impl Edge {
    pub fn new(actor: ActorId, target: TargetId) -> Self {
        Self { actor, target }
    }
}

/// Supported relationship kinds. All three are structurally identical;
/// the kind selects which persisted collection holds the edges and
/// which counter column on the target entity mirrors them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Bookmark,
    Dislike,
    Follow,
}

impl RelationKind {
    /// Get all supported kinds
    pub fn all() -> &'static [RelationKind] {
        &[
            RelationKind::Bookmark,
            RelationKind::Dislike,
            RelationKind::Follow,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Bookmark => "bookmark",
            RelationKind::Dislike => "dislike",
            RelationKind::Follow => "follow",
        }
    }

    /// Table holding this kind's edges
    pub fn edge_table(&self) -> &'static str {
        match self {
            RelationKind::Bookmark => "bookmarks",
            RelationKind::Dislike => "dislikes",
            RelationKind::Follow => "follows",
        }
    }

    /// Table holding this kind's target entities
    pub fn target_table(&self) -> &'static str {
        match self {
            RelationKind::Bookmark | RelationKind::Dislike => "items",
            RelationKind::Follow => "users",
        }
    }

    /// Denormalized counter column on the target table
    pub fn counter_column(&self) -> &'static str {
        match self {
            RelationKind::Bookmark => "bookmark_count",
            RelationKind::Dislike => "dislike_count",
            RelationKind::Follow => "follower_count",
        }
    }
}

impl std::fmt::Display for RelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a successful toggle. The count is the denormalized value
/// after the toggle's own counter write (or a fresh read when a
/// concurrent toggle already applied the transition).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "count")]
pub enum ToggleOutcome {
    Linked(u64),
    Unlinked(u64),
}

impl ToggleOutcome {
    pub fn is_linked(&self) -> bool {
        matches!(self, ToggleOutcome::Linked(_))
    }

    pub fn count(&self) -> u64 {
        match self {
            ToggleOutcome::Linked(n) | ToggleOutcome::Unlinked(n) => *n,
        }
    }
}
