//! Types for the roadmap storage API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Base URL for the roadmap storage HTTP API
    pub base_url: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Roadmap Content API Types
// ============================================================================

/// Role as served by the storage API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Level as served by the storage API
///
/// `rank` is a plain string on the wire ("junior", "mid", "senior");
/// validation happens at ingest, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelEntry {
    pub id: String,
    pub role_id: String,
    pub rank: String,
}

/// Topic as served by the storage API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicEntry {
    pub id: String,
    pub level_id: String,
    pub title: String,
    #[serde(default)]
    pub estimated_minutes: u32,
    #[serde(default)]
    pub prerequisite_topic_ids: Vec<String>,
}

/// Resource as served by the storage API
///
/// `kind` is a plain string on the wire ("article", "video", "question");
/// the kind/payload pairing is validated at ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntry {
    pub id: String,
    pub topic_id: String,
    pub kind: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub question_id: Option<String>,
}

/// Full roadmap payload for one (role, level) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapPayload {
    pub role: RoleEntry,
    pub level: LevelEntry,
    #[serde(default)]
    pub topics: Vec<TopicEntry>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

// ============================================================================
// Progress API Types
// ============================================================================

/// One per-topic completion entry for a user
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub topic_id: String,
    /// RFC 3339 completion timestamp, or null for an un-completed record
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Response from the progress fetch endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressResponse {
    pub user_id: String,
    #[serde(default)]
    pub entries: Vec<ProgressEntry>,
}

/// Request body for the progress persist endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutProgressRequest {
    pub completed: bool,
}
