use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored message draft. At most one row exists per
/// (user_id, prospect_id, custom_instructions, generated_on) — the cache key.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GeneratedMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    pub prospect_id: Uuid,
    pub content: String,
    pub subject: String,
    pub custom_instructions: Option<String>,
    pub generated_on: NaiveDate,
    pub detail: serde_json::Value,
    pub approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Structured generation detail stored in the `detail` jsonb column.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub subject: String,
    pub selected_highlight: String,
    pub selected_challenge: String,
}
