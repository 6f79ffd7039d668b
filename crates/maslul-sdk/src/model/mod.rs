//! Normalized roadmap content model
//!
//! Immutable, id-indexed entities for the role → level → topic → resource
//! hierarchy, plus the per-user `ProgressRecord` and the derived
//! `RoadmapView`. Entities are flat with explicit parent references;
//! nested views are derived on read, never maintained as mutable trees.

mod snapshot;

pub use snapshot::{ingest_roles, ContentSnapshot, SnapshotStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifies a career track (e.g. "frontend")
    RoleId
);
id_type!(
    /// Identifies a level; carried from the wire but never joined on —
    /// levels are addressed by the compound key (role, rank)
    LevelId
);
id_type!(
    /// Identifies a unit of learning content within a level
    TopicId
);
id_type!(
    /// Identifies a leaf resource attached to a topic
    ResourceId
);
id_type!(
    /// Opaque user identifier supplied by the identity collaborator
    UserId
);

// ============================================================================
// Content Entities
// ============================================================================

/// Seniority tier within a role, totally ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Junior,
    Mid,
    Senior,
}

impl Rank {
    /// All ranks in ascending order
    pub fn all() -> [Rank; 3] {
        [Rank::Junior, Rank::Mid, Rank::Senior]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Junior => "junior",
            Rank::Mid => "mid",
            Rank::Senior => "senior",
        }
    }

    /// Parse a wire rank string; returns `None` for anything but the
    /// three known tiers
    pub fn parse(s: &str) -> Option<Rank> {
        match s {
            "junior" => Some(Rank::Junior),
            "mid" => Some(Rank::Mid),
            "senior" => Some(Rank::Senior),
            _ => None,
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A career track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
}

/// A seniority tier within a role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: LevelId,
    pub role_id: RoleId,
    pub rank: Rank,
}

/// A unit of learning content within a level
///
/// Prerequisite edges are scoped to the topic's own (role, level) pair
/// and validated acyclic at ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    pub level_id: LevelId,
    pub title: String,
    pub estimated_minutes: u32,
    pub prerequisite_topic_ids: BTreeSet<TopicId>,
}

/// Leaf content attached to a topic; purely descriptive, no progress of
/// its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub topic_id: TopicId,
    pub kind: ResourceKind,
}

/// Resource kind with its payload; an invalid kind/payload pairing is
/// unrepresentable once ingested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResourceKind {
    Article { url: String },
    Video { url: String },
    Question { question_id: String },
}

// ============================================================================
// Progress
// ============================================================================

/// Per-user, per-topic completion marker — the only mutable entity.
///
/// Absence of a record means "not started"; a record is created on first
/// completion and updated (never deleted) on un-complete, preserving the
/// completion history ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub topic_id: TopicId,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    /// The implicit default for a (user, topic) pair with no record
    pub fn not_started(user_id: UserId, topic_id: TopicId) -> Self {
        Self {
            user_id,
            topic_id,
            completed_at: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

// ============================================================================
// Derived View
// ============================================================================

/// One topic with its computed lock and completion state
#[derive(Debug, Clone)]
pub struct TopicView {
    pub topic: Arc<Topic>,
    pub locked: bool,
    pub completed: bool,
}

/// Fully computed view for one (role, level) pair: content merged with
/// progress and lock state. Derived on read, never persisted.
#[derive(Debug, Clone)]
pub struct RoadmapView {
    pub role: Arc<Role>,
    pub level: Arc<Level>,
    pub topics: Vec<TopicView>,
    /// Completed topics as a percentage of the level, rounded to the
    /// nearest integer; a level with zero topics reports 0
    pub completion_pct: u8,
    pub completed_count: usize,
    pub total_count: usize,
    pub estimated_minutes_total: u32,
    pub estimated_minutes_remaining: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ordering() {
        assert!(Rank::Junior < Rank::Mid);
        assert!(Rank::Mid < Rank::Senior);
        assert_eq!(Rank::all(), [Rank::Junior, Rank::Mid, Rank::Senior]);
    }

    #[test]
    fn test_rank_parse() {
        assert_eq!(Rank::parse("junior"), Some(Rank::Junior));
        assert_eq!(Rank::parse("mid"), Some(Rank::Mid));
        assert_eq!(Rank::parse("senior"), Some(Rank::Senior));
        assert_eq!(Rank::parse("principal"), None);
    }

    #[test]
    fn test_resource_kind_serialization() {
        let kind = ResourceKind::Question {
            question_id: "q-42".into(),
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"question\""));

        let back: ResourceKind = serde_json::from_str(&json).unwrap();
        assert_eq!(kind, back);
    }

    #[test]
    fn test_progress_record_default_is_not_started() {
        let record = ProgressRecord::not_started("u1".into(), "t1".into());
        assert!(!record.is_completed());
        assert_eq!(record.completed_at, None);
    }
}
