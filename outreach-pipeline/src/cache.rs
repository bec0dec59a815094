//! Cache resolver — splits candidates into cached hits and a generation queue
//!
//! One up-front lookup for the whole resolved set, keyed on
//! (user, prospect, custom instructions, day). Hits are re-emitted from the
//! stored row without touching the generation service; misses proceed to
//! batching. The lookup is not interleaved with generation, so cached items
//! stream out before the first batch starts.

use std::collections::HashMap;

use chrono::NaiveDate;
use outreach_core::models::GeneratedMessage;
use sqlx::PgPool;
use uuid::Uuid;

use crate::resolver::Candidate;

#[derive(Debug, Clone)]
pub struct CacheHit {
    pub candidate: Candidate,
    pub message: GeneratedMessage,
}

#[derive(Debug, Default)]
pub struct CacheSplit {
    pub cached: Vec<CacheHit>,
    pub pending: Vec<Candidate>,
}

pub async fn split_cached(
    pool: &PgPool,
    user_id: Uuid,
    day: NaiveDate,
    custom_instructions: Option<&str>,
    candidates: Vec<Candidate>,
) -> Result<CacheSplit, sqlx::Error> {
    if candidates.is_empty() {
        return Ok(CacheSplit::default());
    }

    let prospect_ids: Vec<Uuid> = candidates.iter().map(|c| c.prospect.id).collect();

    let rows: Vec<GeneratedMessage> = sqlx::query_as(
        "SELECT id, user_id, prospect_id, content, subject, custom_instructions,
                generated_on, detail, approved, created_at, updated_at
         FROM generated_messages
         WHERE user_id = $1
           AND generated_on = $2
           AND custom_instructions IS NOT DISTINCT FROM $3
           AND prospect_id = ANY($4)",
    )
    .bind(user_id)
    .bind(day)
    .bind(custom_instructions)
    .bind(prospect_ids)
    .fetch_all(pool)
    .await?;

    let mut by_prospect: HashMap<Uuid, GeneratedMessage> =
        rows.into_iter().map(|m| (m.prospect_id, m)).collect();

    let mut split = CacheSplit::default();
    for candidate in candidates {
        match by_prospect.remove(&candidate.prospect.id) {
            Some(message) => split.cached.push(CacheHit { candidate, message }),
            None => split.pending.push(candidate),
        }
    }

    Ok(split)
}
