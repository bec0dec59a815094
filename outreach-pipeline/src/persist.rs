//! Persistence writer — message row creation and in-place regeneration
//!
//! Inserts re-check the cache key immediately before writing and return the
//! existing row when the race loses. The window between the check and the
//! insert is not closed by a lock or constraint; see DESIGN.md.

use chrono::NaiveDate;
use outreach_core::models::{GeneratedMessage, MessageDetail};
use sqlx::PgPool;
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "id, user_id, prospect_id, content, subject, custom_instructions, \
                               generated_on, detail, approved, created_at, updated_at";

#[derive(Debug)]
pub struct NewMessage<'a> {
    pub user_id: Uuid,
    pub prospect_id: Uuid,
    pub content: &'a str,
    pub subject: &'a str,
    pub custom_instructions: Option<&'a str>,
    pub generated_on: NaiveDate,
    pub detail: &'a MessageDetail,
}

pub async fn find_existing(
    pool: &PgPool,
    user_id: Uuid,
    prospect_id: Uuid,
    custom_instructions: Option<&str>,
    day: NaiveDate,
) -> Result<Option<GeneratedMessage>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM generated_messages
         WHERE user_id = $1
           AND prospect_id = $2
           AND custom_instructions IS NOT DISTINCT FROM $3
           AND generated_on = $4",
    ))
    .bind(user_id)
    .bind(prospect_id)
    .bind(custom_instructions)
    .bind(day)
    .fetch_optional(pool)
    .await
}

/// Create the message row, unless a row for the same cache key appeared
/// since the up-front cache split — then return that row unchanged.
pub async fn insert_message(
    pool: &PgPool,
    new: NewMessage<'_>,
) -> Result<GeneratedMessage, sqlx::Error> {
    if let Some(existing) = find_existing(
        pool,
        new.user_id,
        new.prospect_id,
        new.custom_instructions,
        new.generated_on,
    )
    .await?
    {
        tracing::debug!(
            message_id = %existing.id,
            prospect_id = %new.prospect_id,
            "message appeared since cache split, keeping existing row"
        );
        return Ok(existing);
    }

    sqlx::query_as(&format!(
        "INSERT INTO generated_messages
             (id, user_id, prospect_id, content, subject, custom_instructions,
              generated_on, detail, approved)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, false)
         RETURNING {MESSAGE_COLUMNS}",
    ))
    .bind(Uuid::new_v4())
    .bind(new.user_id)
    .bind(new.prospect_id)
    .bind(new.content)
    .bind(new.subject)
    .bind(new.custom_instructions)
    .bind(new.generated_on)
    .bind(serde_json::to_value(new.detail).unwrap_or(serde_json::json!({})))
    .fetch_one(pool)
    .await
}

/// Regeneration path: replace content/subject/detail on the same row id.
pub async fn update_message(
    pool: &PgPool,
    id: Uuid,
    content: &str,
    subject: &str,
    detail: &MessageDetail,
) -> Result<GeneratedMessage, sqlx::Error> {
    sqlx::query_as(&format!(
        "UPDATE generated_messages
         SET content = $2, subject = $3, detail = $4, updated_at = now()
         WHERE id = $1
         RETURNING {MESSAGE_COLUMNS}",
    ))
    .bind(id)
    .bind(content)
    .bind(subject)
    .bind(serde_json::to_value(detail).unwrap_or(serde_json::json!({})))
    .fetch_one(pool)
    .await
}

/// Load the user's messages for a regeneration request. Ids that do not
/// exist or belong to another user are dropped.
pub async fn find_by_ids(
    pool: &PgPool,
    user_id: Uuid,
    message_ids: &[Uuid],
) -> Result<Vec<GeneratedMessage>, sqlx::Error> {
    if message_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM generated_messages
         WHERE user_id = $1 AND id = ANY($2)
         ORDER BY created_at",
    ))
    .bind(user_id)
    .bind(message_ids.to_vec())
    .fetch_all(pool)
    .await
}
