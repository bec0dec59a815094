use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A plausible business pain-point used as a conversational hook.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Challenge {
    pub id: Uuid,
    pub prospect_id: Uuid,
    pub challenge: String,
    pub relevance: String,
}
