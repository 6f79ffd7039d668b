//! Error types for the Maslul SDK

use crate::model::{RoleId, TopicId};
use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
///
/// Variants are `Clone` so a single failure can be both broadcast to
/// event subscribers and returned to the caller.
#[derive(Debug, Clone, Error)]
pub enum SdkError {
    /// Ingest-time structural or graph violation; fatal for that content
    /// snapshot, never partially applied
    #[error("malformed content: {0}")]
    MalformedContent(String),

    /// Terminal 4xx outcome; never retried
    #[error("client request failed ({status}): {message}")]
    ClientRequest { status: u16, message: String },

    /// Timeout or 5xx; surfaced only after the retry policy is exhausted
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    /// Mutation rejected because a direct prerequisite is incomplete
    #[error("prerequisites not met for topic {topic_id}: missing {missing:?}")]
    PrerequisitesNotMet {
        topic_id: TopicId,
        missing: Vec<TopicId>,
    },

    /// Mutation rejected because one is already in flight for this record
    #[error("mutation already in flight for topic {topic_id}")]
    MutationInProgress { topic_id: TopicId },

    /// View requested for a role the engine has no content for
    #[error("unknown role: {0}")]
    UnknownRole(RoleId),

    /// Mutation requested for a topic outside any fetched roadmap
    #[error("unknown topic: {0}")]
    UnknownTopic(TopicId),
}

/// Failure reported by a remote source, classified for the retry policy.
///
/// The cache layer retries `Transient` failures with exponential backoff
/// and treats everything else as terminal.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// 4xx outcome; terminal
    #[error("client request failed ({status}): {message}")]
    Client { status: u16, message: String },

    /// Timeout, connection failure, or 5xx outcome; retryable
    #[error("transient network failure: {0}")]
    Transient(String),

    /// Payload failed structural validation
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl FetchError {
    /// Whether the retry policy applies to this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

impl From<FetchError> for SdkError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Client { status, message } => SdkError::ClientRequest { status, message },
            FetchError::Transient(message) => SdkError::TransientNetwork(message),
            FetchError::Malformed(message) => SdkError::MalformedContent(message),
        }
    }
}
