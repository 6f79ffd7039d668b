//! Maslul SDK - Roadmap Hierarchy & Progress Tracking Engine
//!
//! Client-side engine for role-based interview preparation roadmaps:
//! models the role → level → topic → resource tree, tracks per-user
//! completion, resolves prerequisite locks, and mediates all remote
//! reads and writes through a stale-while-revalidate keyed cache.
//!
//! # Architecture
//!
//! ```text
//! RoadmapClient            ← Query facade: views, mutations, events
//!     │
//! SwrCache                 ← Keyed cache: freshness, coalescing, retry
//!     │
//! ContentSnapshot          ← Validated, immutable content model
//! ProgressStore            ← Optimistic per-user completion state
//! resolve_locks            ← Prerequisite lock computation
//!     │
//! RemoteStore traits       ← Backend seam (maslul-storage-client)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use maslul_sdk::{Rank, RoadmapClient};
//! use maslul_storage_client::StorageConfig;
//!
//! let client = RoadmapClient::for_backend(StorageConfig {
//!     base_url: "https://api.example.com".into(),
//!     ..Default::default()
//! });
//!
//! // Serve a merged, lock-annotated view; cached content is served
//! // immediately and revalidated in the background once stale.
//! let view = client
//!     .roadmap_view(&"user-1".into(), &"backend".into(), Rank::Mid)
//!     .await?;
//!
//! // Mutations apply optimistically and revert if persistence fails.
//! client.complete_topic(&"user-1".into(), &view.topics[0].topic.id).await?;
//! ```

// Content model: entities, ingest, validation
pub mod model;

// Per-user completion state with commit/revert mutations
pub mod progress;

// Prerequisite lock resolution
pub mod resolver;

// Stale-while-revalidate keyed cache
pub mod cache;

// Query facade
pub mod client;

// Engine notifications
pub mod events;

// Remote source seams
pub mod traits;

// Storage-client bridge
mod backend;

// Error types
pub mod error;

// Re-export model types
pub use model::{
    ContentSnapshot, Level, LevelId, ProgressRecord, Rank, Resource, ResourceId, ResourceKind,
    RoadmapView, Role, RoleId, SnapshotStats, Topic, TopicId, TopicView, UserId,
};

// Re-export progress types
pub use progress::{LevelProgress, MutationGuard, MutationOutcome, ProgressStore};

// Re-export resolver entry points
pub use resolver::resolve_locks;

// Re-export cache types
pub use cache::{CacheEntry, CacheKey, CachePolicy, CacheStats, CacheStatus, RetryPolicy, SwrCache};

// Re-export client types
pub use client::{EngineStats, RoadmapClient};

// Re-export events
pub use events::EngineEvent;

// Re-export traits
pub use traits::{ProgressSink, ProgressSource, RemoteStore, RoadmapSource};

// Re-export error types
pub use error::{FetchError, Result, SdkError};

// Re-export from the storage client
pub use maslul_storage_client::{StorageClient, StorageConfig};
