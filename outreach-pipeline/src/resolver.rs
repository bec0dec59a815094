//! Input resolver — assembles generation candidates for a request
//!
//! For a requested prospect set (explicit ids or all of the user's
//! prospects), loads the candidate's highlight text, each prospect's
//! selected contact, and its challenges. A missing profile fails the whole
//! request; a prospect missing its match or having zero challenges is
//! silently excluded and never produces an event.

use std::collections::HashMap;

use outreach_core::models::{Challenge, MatchSelection, Prospect};
use outreach_core::OutreachError;
use sqlx::PgPool;
use uuid::Uuid;

/// A prospect that has everything generation needs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub prospect: Prospect,
    pub contact: MatchSelection,
    pub challenges: Vec<Challenge>,
}

#[derive(Debug, Clone)]
pub struct ResolvedInputs {
    pub highlights: String,
    pub candidates: Vec<Candidate>,
    /// Prospect rows found for the request, before match/challenge filtering.
    pub requested: usize,
}

pub async fn resolve_inputs(
    pool: &PgPool,
    user_id: Uuid,
    prospect_ids: Option<&[Uuid]>,
) -> Result<ResolvedInputs, OutreachError> {
    let highlights = load_highlights(pool, user_id).await?;

    let prospects = load_prospects(pool, user_id, prospect_ids).await?;
    let requested = prospects.len();

    let ids: Vec<Uuid> = prospects.iter().map(|p| p.id).collect();
    let mut matches = load_matches(pool, &ids).await?;
    let mut challenges = load_challenges(pool, &ids).await?;

    let mut candidates = Vec::with_capacity(prospects.len());
    for prospect in prospects {
        let contact = match matches.remove(&prospect.id) {
            Some(c) => c,
            None => {
                tracing::debug!(prospect_id = %prospect.id, "no contact selected, excluding prospect");
                continue;
            }
        };
        let prospect_challenges = challenges.remove(&prospect.id).unwrap_or_default();
        if prospect_challenges.is_empty() {
            tracing::debug!(prospect_id = %prospect.id, "no challenges, excluding prospect");
            continue;
        }
        candidates.push(Candidate {
            prospect,
            contact,
            challenges: prospect_challenges,
        });
    }

    if candidates.is_empty() {
        tracing::info!(
            user_id = %user_id,
            requested = requested,
            "no prospects resolvable for generation (missing matches or challenges)"
        );
    }

    Ok(ResolvedInputs {
        highlights,
        candidates,
        requested,
    })
}

/// The highlight precondition is global: no highlights fails the entire
/// request before any per-prospect work.
async fn load_highlights(pool: &PgPool, user_id: Uuid) -> Result<String, OutreachError> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT highlights FROM candidate_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

    match row {
        Some((highlights,)) if !highlights.trim().is_empty() => Ok(highlights),
        _ => Err(OutreachError::MissingProfile),
    }
}

async fn load_prospects(
    pool: &PgPool,
    user_id: Uuid,
    prospect_ids: Option<&[Uuid]>,
) -> Result<Vec<Prospect>, sqlx::Error> {
    match prospect_ids {
        Some(ids) => {
            sqlx::query_as(
                "SELECT id, user_id, company, job_title, location, description, created_at
                 FROM prospects
                 WHERE user_id = $1 AND id = ANY($2)
                 ORDER BY created_at",
            )
            .bind(user_id)
            .bind(ids.to_vec())
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as(
                "SELECT id, user_id, company, job_title, location, description, created_at
                 FROM prospects
                 WHERE user_id = $1
                 ORDER BY created_at",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
        }
    }
}

async fn load_matches(
    pool: &PgPool,
    prospect_ids: &[Uuid],
) -> Result<HashMap<Uuid, MatchSelection>, sqlx::Error> {
    if prospect_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<MatchSelection> = sqlx::query_as(
        "SELECT prospect_id, contact_name, contact_title
         FROM prospect_matches
         WHERE prospect_id = ANY($1)",
    )
    .bind(prospect_ids.to_vec())
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|m| (m.prospect_id, m)).collect())
}

async fn load_challenges(
    pool: &PgPool,
    prospect_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Challenge>>, sqlx::Error> {
    if prospect_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<Challenge> = sqlx::query_as(
        "SELECT id, prospect_id, challenge, relevance
         FROM prospect_challenges
         WHERE prospect_id = ANY($1)
         ORDER BY id",
    )
    .bind(prospect_ids.to_vec())
    .fetch_all(pool)
    .await?;

    let mut grouped: HashMap<Uuid, Vec<Challenge>> = HashMap::new();
    for challenge in rows {
        grouped.entry(challenge.prospect_id).or_default().push(challenge);
    }
    Ok(grouped)
}
