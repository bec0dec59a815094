//! Generation-service client — message drafting via the Gemini API
//!
//! Provides a `GenerationBackend` trait with a Gemini `generateContent`
//! implementation. The backend receives a system prompt (prompt variant plus
//! any custom instructions) and a combined JSON payload for one batch, and
//! returns the raw text of the model response. Parsing of that text into
//! per-prospect drafts happens in the pipeline, not here.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;

// ============================================================================
// GenerationBackend trait
// ============================================================================

/// Abstraction over text-generation providers.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Run one completion: `system_prompt` as system context, `user_payload`
    /// as the user content. Returns the raw response text.
    async fn complete(
        &self,
        system_prompt: &str,
        user_payload: &str,
    ) -> Result<String, GenerationError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Response contained no candidate text")]
    MissingContent,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

// ============================================================================
// Config
// ============================================================================

#[derive(Debug, Clone)]
pub struct GenerationClientConfig {
    pub api_key: String,
    pub model: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub timeout_seconds: u64,
}

impl GenerationClientConfig {
    pub fn new(api_key: Option<String>, model: String) -> Self {
        let api_key = api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .unwrap_or_default();

        Self {
            api_key,
            model,
            max_retries: 3,
            retry_delay_ms: 1000,
            timeout_seconds: 60,
        }
    }
}

/// Create the production backend from configuration.
pub fn create_client(
    config: GenerationClientConfig,
) -> Result<Box<dyn GenerationBackend>, GenerationError> {
    Ok(Box::new(GeminiGenerationClient::new(config)?))
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiTurn>,
}

#[derive(Debug, Serialize)]
struct GeminiTurn {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiGenerationClient
// ============================================================================

/// Gemini generation client — calls the `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiGenerationClient {
    client: Client,
    config: GenerationClientConfig,
    base_url: String,
}

impl GeminiGenerationClient {
    pub fn new(config: GenerationClientConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(
        config: GenerationClientConfig,
        base_url: String,
    ) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    async fn complete_with_retry(
        &self,
        system_prompt: &str,
        user_payload: &str,
    ) -> Result<String, GenerationError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = Retry::spawn(retry_strategy, || {
            self.complete_once(system_prompt, user_payload)
        })
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::error!(
                    attempts = self.config.max_retries,
                    error = %e,
                    "All generation retry attempts failed"
                );
                Err(GenerationError::RetryExhausted {
                    attempts: self.config.max_retries,
                })
            }
        }
    }

    async fn complete_once(
        &self,
        system_prompt: &str,
        user_payload: &str,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.config.model, self.config.api_key
        );

        let request = GeminiRequest {
            system_instruction: GeminiContent {
                parts: vec![GeminiPart {
                    text: system_prompt.to_string(),
                }],
            },
            contents: vec![GeminiTurn {
                role: "user".to_string(),
                parts: vec![GeminiPart {
                    text: user_payload.to_string(),
                }],
            }],
        };

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error);

            let (code, message) = error_detail
                .map(|e| (e.code, e.message))
                .unwrap_or((status.as_u16(), error_body));

            tracing::error!(code = code, message = %message, "Gemini API error");

            return Err(GenerationError::Api { code, message });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        let text = gemini_response
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(GenerationError::MissingContent);
        }

        Ok(text)
    }
}

#[async_trait]
impl GenerationBackend for GeminiGenerationClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_payload: &str,
    ) -> Result<String, GenerationError> {
        self.complete_with_retry(system_prompt, user_payload).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(api_key: &str) -> GenerationClientConfig {
        GenerationClientConfig {
            api_key: api_key.to_string(),
            model: "gemini-2.0-flash".to_string(),
            max_retries: 3,
            retry_delay_ms: 100,
            timeout_seconds: 10,
        }
    }

    fn mock_generation_response(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [
                { "content": { "parts": [{ "text": text }], "role": "model" } }
            ]
        })
    }

    #[tokio::test]
    async fn test_complete_sends_system_instruction_and_payload() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiGenerationClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.0-flash:generateContent"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "systemInstruction": { "parts": [{ "text": "you write outreach messages" }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "{\"prospects\":[]}" }] }
                ]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(mock_generation_response("[]")),
            )
            .mount(&mock_server)
            .await;

        let result = client
            .complete("you write outreach messages", "{\"prospects\":[]}")
            .await;

        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result.err());
        assert_eq!(result.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_complete_returns_error_on_api_500() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiGenerationClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
                "error": { "code": 500, "message": "Internal server error" }
            })))
            .mount(&mock_server)
            .await;

        let result = client.complete("system", "payload").await;

        assert!(result.is_err(), "Expected error on 500 response");
        match result {
            Err(GenerationError::RetryExhausted { attempts }) => {
                assert_eq!(attempts, 3, "Expected 3 retry attempts");
            }
            _ => panic!("Expected RetryExhausted error"),
        }
    }

    #[tokio::test]
    async fn test_complete_retries_on_429_then_succeeds() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiGenerationClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Rate limit exceeded" }
            })))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(mock_generation_response("[{\"subject\":\"hi\"}]")),
            )
            .mount(&mock_server)
            .await;

        let result = client.complete("system", "payload").await;

        assert!(result.is_ok(), "Expected success after retry");
        assert_eq!(result.unwrap(), "[{\"subject\":\"hi\"}]");
    }

    #[tokio::test]
    async fn test_new_fails_with_missing_api_key() {
        let config = test_config("");
        let result = GeminiGenerationClient::new(config);

        assert!(result.is_err(), "Expected error with missing API key");
        match result {
            Err(GenerationError::MissingApiKey) => {}
            _ => panic!("Expected MissingApiKey error"),
        }
    }

    #[tokio::test]
    async fn test_complete_returns_error_on_empty_candidates() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let client = GeminiGenerationClient::with_base_url(config, mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&mock_server)
            .await;

        let result = client.complete("system", "payload").await;

        assert!(result.is_err(), "Expected error on empty candidates");
        match result {
            Err(GenerationError::RetryExhausted { .. }) => {}
            _ => panic!("Expected RetryExhausted after MissingContent retries"),
        }
    }

    #[tokio::test]
    async fn test_backend_trait_object() {
        let mock_server = MockServer::start().await;
        let config = test_config("test-api-key");
        let backend: Box<dyn GenerationBackend> = Box::new(
            GeminiGenerationClient::with_base_url(config, mock_server.uri()).unwrap(),
        );

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(mock_generation_response("draft text")),
            )
            .mount(&mock_server)
            .await;

        let result = backend.complete("system", "payload").await.unwrap();
        assert_eq!(result, "draft text");
        assert_eq!(backend.name(), "gemini");
    }
}
