use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Prospect {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company: String,
    pub job_title: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
