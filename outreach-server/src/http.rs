//! Outreach HTTP API
//!
//! Axum-based HTTP server exposing the message-generation pipeline.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a
//! pure inner function. The inner functions are directly testable without
//! axum dispatch machinery.
//!
//! Endpoints:
//! - GET  /health               — health check with DB status
//! - GET  /version              — server version info
//! - POST /messages/generate    — streaming message generation
//! - POST /messages/regenerate  — streaming message regeneration
//!
//! The generate/regenerate responses are chunked `application/x-ndjson`
//! streams of `event-name: json` frames (status / message / complete).
//! Failures that occur before streaming begins (401/429/400) are plain JSON
//! error responses instead of a stream.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use outreach_core::genai::GenerationBackend;
use outreach_core::{OutreachConfig, OutreachError};
use outreach_pipeline::diversity::RngChoice;
use outreach_pipeline::{Pipeline, PipelineEvent, PipelineSettings, PreparedRun};
use serde::Deserialize;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::auth::AuthBackend;

/// Shared state for all HTTP handlers
pub struct AppState {
    pub pool: PgPool,
    pub config: OutreachConfig,
    pub backend: Arc<dyn GenerationBackend>,
    pub auth: Arc<dyn AuthBackend>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/messages/generate", post(generate_handler))
        .route("/messages/regenerate", post(regenerate_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.service.host, state.config.service.port
    );

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Outreach HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

fn default_mention_job() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub custom_instructions: Option<String>,
    #[serde(default = "default_mention_job")]
    pub mention_job_in_messages: bool,
    pub prospect_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateRequest {
    pub auto_generate: bool,
    pub feedback: Option<String>,
    pub message_ids: Vec<Uuid>,
    #[serde(default = "default_mention_job")]
    pub mention_job_in_messages: bool,
    pub custom_instructions: Option<String>,
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health check — queries DB and returns (status_code, json_body).
pub async fn health_inner(pool: &PgPool) -> (StatusCode, serde_json::Value) {
    match outreach_core::db::health_check(pool).await {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": version,
            }),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
            }),
        ),
    }
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "outreach/1",
    })
}

/// Extract the bearer credential from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Map a request-fatal pipeline error to its non-streaming response body.
pub fn error_body(error: &OutreachError) -> (StatusCode, serde_json::Value) {
    match error {
        OutreachError::Unauthenticated(msg) => (
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": msg, "status": "error" }),
        ),
        OutreachError::QuotaExceeded { limit, used } => (
            StatusCode::TOO_MANY_REQUESTS,
            serde_json::json!({
                "error": error.to_string(),
                "status": "error",
                "limit": limit,
                "used": used,
                "remaining": (limit - used).max(0),
            }),
        ),
        OutreachError::MissingProfile => (
            StatusCode::BAD_REQUEST,
            serde_json::json!({ "error": error.to_string(), "status": "error" }),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": error.to_string(), "status": "error" }),
        ),
    }
}

/// Resolve the caller via the auth collaborator, or produce the 401 body.
pub async fn authenticate(
    auth: &dyn AuthBackend,
    headers: &HeaderMap,
) -> Result<Uuid, (StatusCode, serde_json::Value)> {
    let token = match bearer_token(headers) {
        Some(t) => t,
        None => {
            return Err(error_body(&OutreachError::Unauthenticated(
                "missing bearer credential".to_string(),
            )));
        }
    };

    auth.resolve_user(token).await.map_err(|e| {
        tracing::debug!(error = %e, "credential resolution failed");
        error_body(&OutreachError::Unauthenticated(e.to_string()))
    })
}

// ============================================================================
// Streaming transport
// ============================================================================

/// Spawn the pipeline run and adapt its event channel into a chunked
/// newline-delimited frame stream. Frames flush as each event arrives;
/// dropping the response body closes the channel and stops generation.
fn stream_response(pipeline: Pipeline, prepared: PreparedRun) -> Response {
    let (tx, rx) = mpsc::channel::<PipelineEvent>(64);

    tokio::spawn(async move {
        pipeline.run(prepared, tx).await;
    });

    let frames = ReceiverStream::new(rx).map(|event| match event.to_frame() {
        Ok(frame) => Ok::<Bytes, Infallible>(Bytes::from(frame)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode event frame");
            Ok(Bytes::new())
        }
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(frames),
    )
        .into_response()
}

fn pipeline_from_state(state: &AppState) -> Pipeline {
    Pipeline::new(
        state.pool.clone(),
        state.backend.clone(),
        PipelineSettings::from(&state.config),
    )
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<GenerateRequest>,
) -> Response {
    let user_id = match authenticate(state.auth.as_ref(), &headers).await {
        Ok(id) => id,
        Err((status, body)) => return (status, Json(body)).into_response(),
    };

    let pipeline = pipeline_from_state(&state);
    let prepared = pipeline
        .prepare_generate(
            user_id,
            Utc::now().date_naive(),
            req.custom_instructions,
            req.mention_job_in_messages,
            req.prospect_ids.as_deref(),
        )
        .await;

    match prepared {
        Ok(prepared) => stream_response(pipeline, prepared),
        Err(e) => {
            let (status, body) = error_body(&e);
            (status, Json(body)).into_response()
        }
    }
}

pub async fn regenerate_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<RegenerateRequest>,
) -> Response {
    let user_id = match authenticate(state.auth.as_ref(), &headers).await {
        Ok(id) => id,
        Err((status, body)) => return (status, Json(body)).into_response(),
    };

    let pipeline = pipeline_from_state(&state);
    let mut chooser = RngChoice;
    let prepared = pipeline
        .prepare_regenerate(
            user_id,
            Utc::now().date_naive(),
            &req.message_ids,
            req.auto_generate,
            req.feedback,
            req.mention_job_in_messages,
            req.custom_instructions,
            &mut chooser,
        )
        .await;

    match prepared {
        Ok(prepared) => stream_response(pipeline, prepared),
        Err(e) => {
            let (status, body) = error_body(&e);
            (status, Json(body)).into_response()
        }
    }
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================
