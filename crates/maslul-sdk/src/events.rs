//! Engine event notifications
//!
//! A bounded broadcast channel carries cache status transitions and
//! mutation outcomes to UI subscribers so they can re-render without
//! polling. Events are notify-and-requery: payloads identify what
//! changed, the authoritative state is read back through the facade.

use crate::cache::{CacheKey, CacheStatus};
use crate::error::SdkError;
use crate::model::{TopicId, UserId};

/// Default capacity for the engine's broadcast channel; a lagged
/// subscriber resubscribes and requeries
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notification emitted by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A cache entry changed status (first fill, stale serve, or a
    /// revalidation landing)
    CacheUpdated { key: CacheKey, status: CacheStatus },

    /// A background revalidation exhausted its retries; cached data is
    /// still served, flagged as errored
    CacheRefreshFailed { key: CacheKey, error: SdkError },

    /// An optimistic mutation was persisted and committed
    MutationCommitted {
        user_id: UserId,
        topic_id: TopicId,
        completed: bool,
    },

    /// An optimistic mutation failed to persist and was rolled back
    MutationReverted {
        user_id: UserId,
        topic_id: TopicId,
        error: SdkError,
    },
}
