//! HTTP client for the roadmap storage API

use crate::error::{Result, StorageError};
use crate::types::*;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;

/// HTTP client for the roadmap storage API
///
/// # Example
///
/// ```rust,no_run
/// use maslul_storage_client::{StorageClient, StorageConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StorageClient::new(StorageConfig {
///     base_url: "http://localhost:8080".into(),
///     ..Default::default()
/// });
///
/// // List roles
/// let roles = client.get_roles().await?;
///
/// // Fetch one roadmap
/// let roadmap = client.get_roadmap("backend", "mid").await?;
/// # Ok(())
/// # }
/// ```
pub struct StorageClient {
    config: StorageConfig,
    client: Client,
}

impl StorageClient {
    /// Create a new storage client
    pub fn new(config: StorageConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .expect("Invalid API key"),
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    /// Get the client configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    // ==================== Roadmap Content API ====================

    /// List all roles
    pub async fn get_roles(&self) -> Result<Vec<RoleEntry>> {
        let url = format!("{}/api/v1/roles", self.config.base_url);

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Get the roadmap for one (role, level) pair
    pub async fn get_roadmap(&self, role_id: &str, rank: &str) -> Result<RoadmapPayload> {
        let url = format!(
            "{}/api/v1/roadmap/{}/{}",
            self.config.base_url,
            urlencoding::encode(role_id),
            urlencoding::encode(rank)
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    // ==================== Progress API ====================

    /// Get all progress entries for a user
    pub async fn get_progress(&self, user_id: &str) -> Result<ProgressResponse> {
        let url = format!(
            "{}/api/v1/progress/{}",
            self.config.base_url,
            urlencoding::encode(user_id)
        );

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Persist one completion flag for a (user, topic) pair
    ///
    /// The endpoint reports success or failure only; there is no
    /// partial-success body to inspect.
    pub async fn put_progress(&self, user_id: &str, topic_id: &str, completed: bool) -> Result<()> {
        let url = format!(
            "{}/api/v1/progress/{}/{}",
            self.config.base_url,
            urlencoding::encode(user_id),
            urlencoding::encode(topic_id)
        );

        let response = self
            .client
            .put(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&PutProgressRequest { completed })
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(format!("{}/{}", user_id, topic_id)));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Server {
                status,
                message: body,
            });
        }
        Ok(())
    }

    // ==================== Helper Methods ====================

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound("Resource not found".to_string()));
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Server {
                status,
                message: body,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_transient_classification() {
        let server = StorageError::Server {
            status: 503,
            message: "unavailable".into(),
        };
        assert!(server.is_transient());

        let client = StorageError::Server {
            status: 422,
            message: "bad input".into(),
        };
        assert!(!client.is_transient());

        assert!(!StorageError::NotFound("x".into()).is_transient());
    }

    #[test]
    fn test_progress_request_serialization() {
        let body = serde_json::to_string(&PutProgressRequest { completed: true }).unwrap();
        assert_eq!(body, r#"{"completed":true}"#);
    }
}
