use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeatureUsage {
    pub user_id: Uuid,
    pub feature: String,
    pub week_start: NaiveDate,
    pub used_count: i64,
}
