use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The contact person selected as the outreach recipient for a prospect.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MatchSelection {
    pub prospect_id: Uuid,
    pub contact_name: String,
    pub contact_title: String,
}

impl MatchSelection {
    pub fn first_name(&self) -> &str {
        self.contact_name
            .split_whitespace()
            .next()
            .unwrap_or(&self.contact_name)
    }
}
