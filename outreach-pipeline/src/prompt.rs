//! Prompt variants, batch payloads, and response parsing
//!
//! Two named prompt variants selected by the request's boolean toggle. The
//! payload for one generation call is a single JSON document covering the
//! whole group; the response must be a JSON array in the same positional
//! order as the input array. The only validation of that assumption is an
//! array-length check (flagged as a design risk in DESIGN.md).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named prompt strategy. New variants are additive here; nothing else
/// branches on the toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptVariant {
    /// Mention the open role at the contact's company directly.
    JobDirect,
    /// Relationship-building opener, no mention of the job.
    RelationshipFirst,
}

impl PromptVariant {
    pub fn from_flag(mention_job: bool) -> Self {
        if mention_job {
            PromptVariant::JobDirect
        } else {
            PromptVariant::RelationshipFirst
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            PromptVariant::JobDirect => "job_direct",
            PromptVariant::RelationshipFirst => "relationship_first",
        }
    }

    pub fn system_text(&self) -> &'static str {
        match self {
            PromptVariant::JobDirect => {
                "You write short, personalized cold-outreach messages on behalf of a job \
                 seeker. For each prospect in the input array, write a message to the named \
                 contact that mentions the role at their company directly, connects one of \
                 the sender's highlights to one of the listed business challenges, and ends \
                 with a low-pressure ask for a conversation. Keep each message under 120 \
                 words, no flattery, no buzzwords.\n\n\
                 Respond with ONLY a JSON array, one object per prospect, in exactly the \
                 same order as the input array. Each object must have the keys: \"subject\", \
                 \"message\", \"selectedHighlight\", \"selectedChallenge\"."
            }
            PromptVariant::RelationshipFirst => {
                "You write short, personalized outreach messages that open a professional \
                 relationship. For each prospect in the input array, write a message to the \
                 named contact about one of the listed business challenges, connecting it \
                 to one of the sender's highlights. Do NOT mention any job opening and do \
                 NOT say the sender is looking for a role. End with a low-pressure ask for \
                 a conversation. Keep each message under 120 words.\n\n\
                 Respond with ONLY a JSON array, one object per prospect, in exactly the \
                 same order as the input array. Each object must have the keys: \"subject\", \
                 \"message\", \"selectedHighlight\", \"selectedChallenge\"."
            }
        }
    }
}

/// Compose the system context for one request: variant text, then optional
/// custom instructions, then optional regeneration feedback (verbatim).
pub fn build_system_prompt(
    variant: PromptVariant,
    custom_instructions: Option<&str>,
    feedback: Option<&str>,
) -> String {
    let mut prompt = variant.system_text().to_string();
    if let Some(instructions) = custom_instructions {
        if !instructions.trim().is_empty() {
            prompt.push_str("\n\nAdditional instructions from the sender: ");
            prompt.push_str(instructions.trim());
        }
    }
    if let Some(feedback) = feedback {
        if !feedback.trim().is_empty() {
            prompt.push_str("\n\nThe previous draft was rejected with this feedback: ");
            prompt.push_str(feedback.trim());
        }
    }
    prompt
}

// ============================================================================
// Batch payload (request side)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadProspect {
    pub company: String,
    pub job_title: String,
    pub location: Option<String>,
    pub contact_first_name: String,
    pub challenges: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPayload {
    pub highlights: String,
    pub prospects: Vec<PayloadProspect>,
}

impl BatchPayload {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// Batch response (parse side)
// ============================================================================

/// One drafted message, positionally matched to a payload prospect.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftItem {
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub selected_highlight: String,
    #[serde(default)]
    pub selected_challenge: String,
}

#[derive(Error, Debug)]
pub enum BatchParseError {
    #[error("response is not a valid JSON array: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response has {actual} items, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Parse the raw model response for one group. The whole group is discarded
/// on any parse failure.
pub fn parse_batch_response(
    raw: &str,
    expected: usize,
) -> Result<Vec<DraftItem>, BatchParseError> {
    let items: Vec<DraftItem> = serde_json::from_str(strip_code_fence(raw.trim()))?;
    if items.len() != expected {
        return Err(BatchParseError::LengthMismatch {
            expected,
            actual: items.len(),
        });
    }
    Ok(items)
}

/// Models routinely wrap JSON in a markdown fence despite instructions.
fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    // Drop the fence line (``` or ```json), then the closing fence.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return raw,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_from_flag() {
        assert_eq!(PromptVariant::from_flag(true), PromptVariant::JobDirect);
        assert_eq!(
            PromptVariant::from_flag(false),
            PromptVariant::RelationshipFirst
        );
    }

    #[test]
    fn test_relationship_variant_forbids_job_mention() {
        let text = PromptVariant::RelationshipFirst.system_text();
        assert!(text.contains("Do NOT mention any job opening"));
        assert!(PromptVariant::JobDirect
            .system_text()
            .contains("mentions the role"));
    }

    #[test]
    fn test_system_prompt_appends_instructions_and_feedback() {
        let prompt = build_system_prompt(
            PromptVariant::JobDirect,
            Some("keep it formal"),
            Some("too long"),
        );
        assert!(prompt.contains("Additional instructions from the sender: keep it formal"));
        assert!(prompt.contains("rejected with this feedback: too long"));
    }

    #[test]
    fn test_system_prompt_skips_blank_instructions() {
        let prompt = build_system_prompt(PromptVariant::JobDirect, Some("   "), None);
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn test_payload_serializes_camel_case_in_order() {
        let payload = BatchPayload {
            highlights: "built a search engine".to_string(),
            prospects: vec![PayloadProspect {
                company: "Acme".to_string(),
                job_title: "Engineer".to_string(),
                location: None,
                contact_first_name: "Dana".to_string(),
                challenges: vec!["slow deploys".to_string()],
            }],
        };
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"jobTitle\":\"Engineer\""));
        assert!(json.contains("\"contactFirstName\":\"Dana\""));
        assert!(json.contains("\"location\":null"));
    }

    #[test]
    fn test_parse_valid_array() {
        let raw = r#"[{"subject":"s","message":"m","selectedHighlight":"h","selectedChallenge":"c"}]"#;
        let items = parse_batch_response(raw, 1).unwrap();
        assert_eq!(items[0].subject, "s");
        assert_eq!(items[0].selected_challenge, "c");
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let raw = "```json\n[{\"subject\":\"s\",\"message\":\"m\"}]\n```";
        let items = parse_batch_response(raw, 1).unwrap();
        assert_eq!(items[0].message, "m");
        assert_eq!(items[0].selected_highlight, "");
    }

    #[test]
    fn test_parse_length_mismatch_fails_group() {
        let raw = r#"[{"subject":"s","message":"m"}]"#;
        let err = parse_batch_response(raw, 2).unwrap_err();
        match err {
            BatchParseError::LengthMismatch { expected, actual } => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 1);
            }
            _ => panic!("expected LengthMismatch"),
        }
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let raw = "Here are your messages!";
        assert!(matches!(
            parse_batch_response(raw, 1),
            Err(BatchParseError::Json(_))
        ));
    }
}
