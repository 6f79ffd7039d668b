//! Remote source seams
//!
//! The backend roadmap storage service is consumed behind these traits;
//! the engine never talks HTTP directly. `maslul-storage-client` provides
//! the production implementation, tests provide in-memory ones.

use crate::error::FetchError;
use crate::model::{Rank, RoleId, TopicId, UserId};
use async_trait::async_trait;
use maslul_storage_client::{ProgressEntry, RoadmapPayload, RoleEntry};

/// Read access to roadmap content
#[async_trait]
pub trait RoadmapSource: Send + Sync {
    /// Fetch the raw roles listing
    async fn fetch_roles(&self) -> Result<Vec<RoleEntry>, FetchError>;

    /// Fetch the raw roadmap payload for one (role, rank) pair
    async fn fetch_roadmap(
        &self,
        role: &RoleId,
        rank: Rank,
    ) -> Result<RoadmapPayload, FetchError>;
}

/// Read access to per-user progress
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Fetch all completion entries for a user
    async fn fetch_progress(&self, user: &UserId) -> Result<Vec<ProgressEntry>, FetchError>;
}

/// Write access for persisting completion flags.
///
/// Persistence reports success or failure only; there are no
/// partial-success semantics to interpret.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn put_progress(
        &self,
        user: &UserId,
        topic: &TopicId,
        completed: bool,
    ) -> Result<(), FetchError>;
}

/// The full remote contract the query facade is constructed over
pub trait RemoteStore: RoadmapSource + ProgressSource + ProgressSink {}

impl<T: RoadmapSource + ProgressSource + ProgressSink> RemoteStore for T {}
