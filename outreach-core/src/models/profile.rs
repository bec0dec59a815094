use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CandidateProfile {
    pub user_id: Uuid,
    pub highlights: String,
    pub updated_at: DateTime<Utc>,
}
