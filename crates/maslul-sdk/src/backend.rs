//! Storage-client bridge
//!
//! Implements the engine's remote-source traits over
//! [`StorageClient`], classifying transport failures for the retry
//! policy: timeouts and 5xx outcomes are transient, any other 4xx is
//! terminal, and an undecodable body is malformed content.

use crate::error::FetchError;
use crate::model::{Rank, RoleId, TopicId, UserId};
use crate::traits::{ProgressSink, ProgressSource, RoadmapSource};
use async_trait::async_trait;
use maslul_storage_client::{ProgressEntry, RoadmapPayload, RoleEntry, StorageClient, StorageError};

impl From<StorageError> for FetchError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Server { status, message } if status >= 500 => {
                FetchError::Transient(format!("server error {}: {}", status, message))
            }
            StorageError::Server { status, message } => FetchError::Client { status, message },
            StorageError::NotFound(what) => FetchError::Client {
                status: 404,
                message: what,
            },
            StorageError::Json(e) => FetchError::Malformed(e.to_string()),
            StorageError::Http(e) => {
                if e.is_decode() {
                    FetchError::Malformed(e.to_string())
                } else {
                    FetchError::Transient(e.to_string())
                }
            }
        }
    }
}

#[async_trait]
impl RoadmapSource for StorageClient {
    async fn fetch_roles(&self) -> Result<Vec<RoleEntry>, FetchError> {
        Ok(self.get_roles().await?)
    }

    async fn fetch_roadmap(
        &self,
        role: &RoleId,
        rank: Rank,
    ) -> Result<RoadmapPayload, FetchError> {
        Ok(self.get_roadmap(role.as_str(), rank.as_str()).await?)
    }
}

#[async_trait]
impl ProgressSource for StorageClient {
    async fn fetch_progress(&self, user: &UserId) -> Result<Vec<ProgressEntry>, FetchError> {
        Ok(self.get_progress(user.as_str()).await?.entries)
    }
}

#[async_trait]
impl ProgressSink for StorageClient {
    async fn put_progress(
        &self,
        user: &UserId,
        topic: &TopicId,
        completed: bool,
    ) -> Result<(), FetchError> {
        Ok(StorageClient::put_progress(self, user.as_str(), topic.as_str(), completed).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_5xx_classified_transient() {
        let err = FetchError::from(StorageError::Server {
            status: 502,
            message: "bad gateway".into(),
        });
        assert!(err.is_transient());
    }

    #[test]
    fn test_4xx_classified_terminal() {
        let err = FetchError::from(StorageError::Server {
            status: 422,
            message: "bad input".into(),
        });
        assert!(matches!(err, FetchError::Client { status: 422, .. }));
    }

    #[test]
    fn test_not_found_classified_terminal() {
        let err = FetchError::from(StorageError::NotFound("roadmap".into()));
        assert!(matches!(err, FetchError::Client { status: 404, .. }));
    }
}
