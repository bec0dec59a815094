use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DailyQuota {
    pub user_id: Uuid,
    pub quota_date: NaiveDate,
    pub used_count: i64,
}
