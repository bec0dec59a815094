//! Pipeline entry points — prepare and run a generation request
//!
//! `prepare_generate` / `prepare_regenerate` perform the pre-stream phases
//! (quota gate, input resolution, cache split, quota truncation) and fail
//! fast with the request-fatal errors. `run` performs the streaming phases:
//! cached emission, sequential group generation, persistence, the quota
//! commit, usage recording, and the terminal `complete` event.
//!
//! Groups run strictly one after another, so event ordering needs no extra
//! synchronization and the final accounting is deterministic. If the event
//! receiver is dropped mid-run, no further generation calls are issued;
//! writes from completed groups stay committed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use outreach_core::genai::GenerationBackend;
use outreach_core::models::MessageDetail;
use outreach_core::{OutreachConfig, OutreachError};
use sqlx::PgPool;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::batch;
use crate::cache::{self, CacheHit};
use crate::diversity::{self, ChoiceSource};
use crate::events::{
    CompleteEvent, ContactRef, MessageEvent, PipelineEvent, ProspectRef, QuotaSummary, StatusEvent,
};
use crate::persist::{self, NewMessage};
use crate::prompt::{self, BatchPayload, PayloadProspect, PromptVariant};
use crate::quota;
use crate::resolver::{self, Candidate};
use crate::usage;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub daily_limit: i64,
}

impl From<&OutreachConfig> for PipelineSettings {
    fn from(config: &OutreachConfig) -> Self {
        Self {
            batch_size: config.generation.batch_size as usize,
            daily_limit: config.quota.daily_limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Generate,
    Regenerate,
}

/// One entry in the generation queue. `existing_id` is set on the
/// regeneration path and routes the draft to an in-place update.
#[derive(Debug, Clone)]
struct QueueItem {
    candidate: Candidate,
    existing_id: Option<Uuid>,
}

/// Everything resolved before streaming begins.
pub struct PreparedRun {
    pub user_id: Uuid,
    pub day: NaiveDate,
    pub mode: RunMode,
    pub variant: PromptVariant,
    pub custom_instructions: Option<String>,
    pub feedback: Option<String>,
    /// Highlight text used in the batch payload (a single picked line on
    /// the auto-regeneration path).
    pub highlights: String,
    cached: Vec<CacheHit>,
    queue: Vec<QueueItem>,
    pub requested: usize,
    pub quota_used: i64,
    pub limit: i64,
}

impl PreparedRun {
    pub fn cached_len(&self) -> usize {
        self.cached.len()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }
}

/// Final accounting for one request; mirrors the `complete` event.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    pub total: usize,
    pub generated: usize,
    pub newly_generated: usize,
    pub quota_used: i64,
    pub cancelled: bool,
}

pub struct Pipeline {
    pool: PgPool,
    backend: Arc<dyn GenerationBackend>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        pool: PgPool,
        backend: Arc<dyn GenerationBackend>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            pool,
            backend,
            settings,
        }
    }

    /// Pre-stream phases of the generate path. Fails with `QuotaExceeded`
    /// or `MissingProfile` before any event is produced.
    pub async fn prepare_generate(
        &self,
        user_id: Uuid,
        day: NaiveDate,
        custom_instructions: Option<String>,
        mention_job: bool,
        prospect_ids: Option<&[Uuid]>,
    ) -> Result<PreparedRun, OutreachError> {
        let status =
            quota::check_and_reserve(&self.pool, user_id, day, self.settings.daily_limit).await?;
        if !status.allowed {
            return Err(OutreachError::QuotaExceeded {
                limit: self.settings.daily_limit,
                used: status.used,
            });
        }

        let resolved = resolver::resolve_inputs(&self.pool, user_id, prospect_ids).await?;
        let split = cache::split_cached(
            &self.pool,
            user_id,
            day,
            custom_instructions.as_deref(),
            resolved.candidates,
        )
        .await?;

        let queue = self.truncate_to_budget(status.used, split.pending);

        Ok(PreparedRun {
            user_id,
            day,
            mode: RunMode::Generate,
            variant: PromptVariant::from_flag(mention_job),
            custom_instructions,
            feedback: None,
            highlights: resolved.highlights,
            cached: split.cached,
            queue: queue
                .into_iter()
                .map(|candidate| QueueItem {
                    candidate,
                    existing_id: None,
                })
                .collect(),
            requested: resolved.requested,
            quota_used: status.used,
            limit: self.settings.daily_limit,
        })
    }

    /// Pre-stream phases of the regenerate path. Starts from message ids,
    /// never consults the cache (the caller asked for a fresh draft), and
    /// applies the diversity selector when `auto_generate` is set without
    /// feedback.
    #[allow(clippy::too_many_arguments)]
    pub async fn prepare_regenerate(
        &self,
        user_id: Uuid,
        day: NaiveDate,
        message_ids: &[Uuid],
        auto_generate: bool,
        feedback: Option<String>,
        mention_job: bool,
        custom_instructions: Option<String>,
        chooser: &mut dyn ChoiceSource,
    ) -> Result<PreparedRun, OutreachError> {
        let status =
            quota::check_and_reserve(&self.pool, user_id, day, self.settings.daily_limit).await?;
        if !status.allowed {
            return Err(OutreachError::QuotaExceeded {
                limit: self.settings.daily_limit,
                used: status.used,
            });
        }

        let messages = persist::find_by_ids(&self.pool, user_id, message_ids).await?;
        let message_by_prospect: HashMap<Uuid, Uuid> =
            messages.iter().map(|m| (m.prospect_id, m.id)).collect();
        let prospect_ids: Vec<Uuid> = messages.iter().map(|m| m.prospect_id).collect();

        let resolved = resolver::resolve_inputs(&self.pool, user_id, Some(&prospect_ids)).await?;

        let feedback = feedback.filter(|f| !f.trim().is_empty());
        let use_diversity = auto_generate && feedback.is_none();

        let highlights = if use_diversity {
            diversity::pick_highlight_line(&resolved.highlights, chooser)
                .map(str::to_string)
                .unwrap_or_else(|| resolved.highlights.clone())
        } else {
            resolved.highlights.clone()
        };

        let mut pending = Vec::with_capacity(resolved.candidates.len());
        for mut candidate in resolved.candidates {
            if use_diversity {
                if let Some(picked) = diversity::pick_challenge(&candidate.challenges, chooser) {
                    candidate.challenges = vec![picked.clone()];
                }
            }
            pending.push(candidate);
        }

        let queue = self.truncate_to_budget(status.used, pending);

        Ok(PreparedRun {
            user_id,
            day,
            mode: RunMode::Regenerate,
            variant: PromptVariant::from_flag(mention_job),
            custom_instructions,
            feedback,
            highlights,
            cached: Vec::new(),
            queue: queue
                .into_iter()
                .map(|candidate| {
                    let existing_id = message_by_prospect.get(&candidate.prospect.id).copied();
                    QueueItem {
                        candidate,
                        existing_id,
                    }
                })
                .collect(),
            requested: resolved.requested,
            quota_used: status.used,
            limit: self.settings.daily_limit,
        })
    }

    /// Items beyond the remaining daily budget are dropped up front: they
    /// appear in `total` but never in the stream.
    fn truncate_to_budget(&self, used: i64, mut pending: Vec<Candidate>) -> Vec<Candidate> {
        let budget = (self.settings.daily_limit - used).max(0) as usize;
        if pending.len() > budget {
            tracing::warn!(
                dropped = pending.len() - budget,
                budget = budget,
                "daily quota truncates generation queue"
            );
            pending.truncate(budget);
        }
        pending
    }

    /// Streaming phases. Event ordering: status, cached messages, then per
    /// group (messages, status), then the terminal complete event.
    pub async fn run(
        &self,
        prepared: PreparedRun,
        tx: mpsc::Sender<PipelineEvent>,
    ) -> RunReport {
        let total = prepared.requested;
        let queue_len = prepared.queue.len();
        let mut generated = 0usize;
        let mut newly_generated = 0usize;
        let mut processed = 0usize;

        tracing::info!(
            user_id = %prepared.user_id,
            mode = ?prepared.mode,
            variant = prepared.variant.key(),
            total = total,
            cached = prepared.cached.len(),
            queued = queue_len,
            "starting message pipeline"
        );

        let mut live = emit(
            &tx,
            PipelineEvent::Status(StatusEvent {
                total,
                generated,
                remaining: queue_len,
                processed,
            }),
        )
        .await;

        for hit in &prepared.cached {
            generated += 1;
            if live {
                live = emit(&tx, cached_message_event(hit)).await;
            }
        }

        let system_prompt = prompt::build_system_prompt(
            prepared.variant,
            prepared.custom_instructions.as_deref(),
            prepared.feedback.as_deref(),
        );

        let mut cancelled = false;
        let groups = batch::chunk(prepared.queue, self.settings.batch_size);
        for (group_index, group) in groups.into_iter().enumerate() {
            if !live {
                // Consumer is gone; stop spending on generation calls.
                tracing::info!(
                    user_id = %prepared.user_id,
                    group = group_index,
                    "consumer disconnected, stopping generation"
                );
                cancelled = true;
                break;
            }

            let payload = BatchPayload {
                highlights: prepared.highlights.clone(),
                prospects: group.iter().map(|item| payload_prospect(&item.candidate)).collect(),
            };

            match batch::generate_group(self.backend.as_ref(), &system_prompt, &payload).await {
                Ok(drafts) => {
                    for (item, draft) in group.iter().zip(drafts) {
                        processed += 1;
                        let detail = MessageDetail {
                            subject: draft.subject.clone(),
                            selected_highlight: draft.selected_highlight,
                            selected_challenge: draft.selected_challenge,
                        };
                        let persisted = match item.existing_id {
                            Some(id) => {
                                persist::update_message(
                                    &self.pool,
                                    id,
                                    &draft.message,
                                    &draft.subject,
                                    &detail,
                                )
                                .await
                            }
                            None => {
                                persist::insert_message(
                                    &self.pool,
                                    NewMessage {
                                        user_id: prepared.user_id,
                                        prospect_id: item.candidate.prospect.id,
                                        content: &draft.message,
                                        subject: &draft.subject,
                                        custom_instructions: prepared
                                            .custom_instructions
                                            .as_deref(),
                                        generated_on: prepared.day,
                                        detail: &detail,
                                    },
                                )
                                .await
                            }
                        };

                        match persisted {
                            Ok(message) => {
                                generated += 1;
                                newly_generated += 1;
                                if live {
                                    live = emit(
                                        &tx,
                                        PipelineEvent::Message(MessageEvent {
                                            prospect: prospect_ref(&item.candidate),
                                            contact: contact_ref(&item.candidate),
                                            content: message.content,
                                            subject: message.subject,
                                            message_id: message.id,
                                            cached: false,
                                        }),
                                    )
                                    .await;
                                }
                            }
                            Err(e) => {
                                tracing::error!(
                                    prospect_id = %item.candidate.prospect.id,
                                    error = %e,
                                    "failed to persist generated message, item omitted"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        group = group_index,
                        size = group.len(),
                        error = %e,
                        "generation group failed, drafts discarded"
                    );
                    processed += group.len();
                }
            }

            if live {
                live = emit(
                    &tx,
                    PipelineEvent::Status(StatusEvent {
                        total,
                        generated,
                        remaining: queue_len - processed,
                        processed,
                    }),
                )
                .await;
            }
        }

        let quota_used = match quota::commit(
            &self.pool,
            prepared.user_id,
            prepared.day,
            newly_generated as i64,
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                tracing::error!(user_id = %prepared.user_id, error = %e, "quota commit failed");
                prepared.quota_used + newly_generated as i64
            }
        };

        if let Err(e) = usage::record(
            &self.pool,
            prepared.user_id,
            usage::FEATURE_MESSAGE_GENERATION,
            prepared.day,
            newly_generated as i64,
        )
        .await
        {
            tracing::error!(user_id = %prepared.user_id, error = %e, "usage record failed");
        }

        if live {
            emit(
                &tx,
                PipelineEvent::Complete(CompleteEvent {
                    total,
                    generated,
                    newly_generated,
                    quota: QuotaSummary {
                        used: quota_used,
                        limit: prepared.limit,
                        remaining: (prepared.limit - quota_used).max(0),
                    },
                }),
            )
            .await;
        }

        tracing::info!(
            user_id = %prepared.user_id,
            total = total,
            generated = generated,
            newly_generated = newly_generated,
            quota_used = quota_used,
            cancelled = cancelled,
            "message pipeline finished"
        );

        RunReport {
            total,
            generated,
            newly_generated,
            quota_used,
            cancelled,
        }
    }
}

/// Send one event; false once the receiver is gone.
async fn emit(tx: &mpsc::Sender<PipelineEvent>, event: PipelineEvent) -> bool {
    tx.send(event).await.is_ok()
}

fn prospect_ref(candidate: &Candidate) -> ProspectRef {
    ProspectRef {
        id: candidate.prospect.id,
        company: candidate.prospect.company.clone(),
        job_title: candidate.prospect.job_title.clone(),
    }
}

fn contact_ref(candidate: &Candidate) -> ContactRef {
    ContactRef {
        name: candidate.contact.contact_name.clone(),
        title: candidate.contact.contact_title.clone(),
    }
}

fn payload_prospect(candidate: &Candidate) -> PayloadProspect {
    PayloadProspect {
        company: candidate.prospect.company.clone(),
        job_title: candidate.prospect.job_title.clone(),
        location: candidate.prospect.location.clone(),
        contact_first_name: candidate.contact.first_name().to_string(),
        challenges: candidate
            .challenges
            .iter()
            .map(|c| c.challenge.clone())
            .collect(),
    }
}

fn cached_message_event(hit: &CacheHit) -> PipelineEvent {
    PipelineEvent::Message(MessageEvent {
        prospect: prospect_ref(&hit.candidate),
        contact: contact_ref(&hit.candidate),
        content: hit.message.content.clone(),
        subject: hit.message.subject.clone(),
        message_id: hit.message.id,
        cached: true,
    })
}
