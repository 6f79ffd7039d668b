//! HTTP client for the Maslul roadmap storage API
//!
//! Thin typed wrapper over the backend request contract:
//!
//! - `GET /api/v1/roles` — list career tracks
//! - `GET /api/v1/roadmap/{role}/{rank}` — one roadmap payload
//! - `GET /api/v1/progress/{user}` — per-user completion entries
//! - `PUT /api/v1/progress/{user}/{topic}` — persist one completion flag
//!
//! Wire shapes here are raw and unvalidated; structural validation
//! (unique ids, prerequisite graph acyclicity, kind/payload pairing)
//! belongs to `maslul-sdk` at ingest time.

pub mod client;
pub mod error;
pub mod types;

pub use client::StorageClient;
pub use error::{Result, StorageError};
pub use types::{
    LevelEntry, ProgressEntry, ProgressResponse, PutProgressRequest, ResourceEntry,
    RoadmapPayload, RoleEntry, StorageConfig, TopicEntry,
};
