//! Auth collaborator — bearer credential resolution
//!
//! Session resolution is owned by an external auth service; this module only
//! defines the seam (`AuthBackend`) and the HTTP client that talks to it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Resolve a bearer token to a user id.
    async fn resolve_user(&self, token: &str) -> Result<Uuid, AuthError>;
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid or expired credential")]
    InvalidToken,

    #[error("auth service error ({code}): {message}")]
    Service { code: u16, message: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user_id: Uuid,
}

/// HTTP client for the auth service's session endpoint.
#[derive(Debug, Clone)]
pub struct HttpAuthClient {
    client: Client,
    base_url: String,
}

impl HttpAuthClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthClient {
    async fn resolve_user(&self, token: &str) -> Result<Uuid, AuthError> {
        let url = format!("{}/v1/session", self.base_url);
        let response = self.client.get(&url).bearer_auth(token).send().await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Service {
                code: status.as_u16(),
                message,
            });
        }

        let session: SessionResponse = response.json().await?;
        Ok(session.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_resolve_user_returns_session_user_id() {
        let mock_server = MockServer::start().await;
        let user_id = Uuid::new_v4();

        Mock::given(method("GET"))
            .and(path("/v1/session"))
            .and(header("authorization", "Bearer token-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "userId": user_id,
            })))
            .mount(&mock_server)
            .await;

        let client = HttpAuthClient::new(mock_server.uri()).unwrap();
        let resolved = client.resolve_user("token-123").await.unwrap();
        assert_eq!(resolved, user_id);
    }

    #[tokio::test]
    async fn test_resolve_user_maps_401_to_invalid_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = HttpAuthClient::new(mock_server.uri()).unwrap();
        let err = client.resolve_user("bad-token").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn test_resolve_user_maps_5xx_to_service_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&mock_server)
            .await;

        let client = HttpAuthClient::new(mock_server.uri()).unwrap();
        let err = client.resolve_user("token").await.unwrap_err();
        match err {
            AuthError::Service { code, message } => {
                assert_eq!(code, 503);
                assert_eq!(message, "maintenance");
            }
            _ => panic!("expected Service error"),
        }
    }
}
