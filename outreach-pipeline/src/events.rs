//! Typed pipeline events and their wire framing
//!
//! The pipeline pushes these over an mpsc channel; the HTTP layer encodes
//! each one as a newline-delimited `event-name: json-payload` frame. Three
//! shapes, in a fixed order: `status` at the start and after every group,
//! `message` once per resolved draft (cached first, then group by group),
//! `complete` exactly once, last.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub total: usize,
    pub generated: usize,
    pub remaining: usize,
    pub processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProspectRef {
    pub id: Uuid,
    pub company: String,
    pub job_title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRef {
    pub name: String,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub prospect: ProspectRef,
    #[serde(rename = "match")]
    pub contact: ContactRef,
    pub content: String,
    pub subject: String,
    pub message_id: Uuid,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSummary {
    pub used: i64,
    pub limit: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteEvent {
    pub total: usize,
    pub generated: usize,
    pub newly_generated: usize,
    pub quota: QuotaSummary,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Status(StatusEvent),
    Message(MessageEvent),
    Complete(CompleteEvent),
}

impl PipelineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Status(_) => "status",
            PipelineEvent::Message(_) => "message",
            PipelineEvent::Complete(_) => "complete",
        }
    }

    /// Encode as a `name: json\n` wire frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let payload = match self {
            PipelineEvent::Status(e) => serde_json::to_string(e)?,
            PipelineEvent::Message(e) => serde_json::to_string(e)?,
            PipelineEvent::Complete(e) => serde_json::to_string(e)?,
        };
        Ok(format!("{}: {}\n", self.name(), payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_frame_shape() {
        let event = PipelineEvent::Status(StatusEvent {
            total: 5,
            generated: 2,
            remaining: 3,
            processed: 2,
        });
        let frame = event.to_frame().unwrap();
        assert!(frame.starts_with("status: {"));
        assert!(frame.ends_with('\n'));
        assert!(frame.contains("\"total\":5"));
        assert!(frame.contains("\"remaining\":3"));
    }

    #[test]
    fn test_message_frame_uses_match_key_and_camel_case() {
        let event = PipelineEvent::Message(MessageEvent {
            prospect: ProspectRef {
                id: Uuid::nil(),
                company: "Acme".to_string(),
                job_title: "Engineer".to_string(),
            },
            contact: ContactRef {
                name: "Dana Smith".to_string(),
                title: "CTO".to_string(),
            },
            content: "hello".to_string(),
            subject: "intro".to_string(),
            message_id: Uuid::nil(),
            cached: true,
        });
        let frame = event.to_frame().unwrap();
        assert!(frame.starts_with("message: "));
        assert!(frame.contains("\"match\":{"), "contact must serialize as 'match': {frame}");
        assert!(frame.contains("\"messageId\""), "camelCase expected: {frame}");
        assert!(frame.contains("\"jobTitle\""), "camelCase expected: {frame}");
        assert!(frame.contains("\"cached\":true"));
    }

    #[test]
    fn test_complete_frame_quota_block() {
        let event = PipelineEvent::Complete(CompleteEvent {
            total: 5,
            generated: 2,
            newly_generated: 2,
            quota: QuotaSummary {
                used: 10,
                limit: 10,
                remaining: 0,
            },
        });
        let frame = event.to_frame().unwrap();
        assert!(frame.starts_with("complete: "));
        assert!(frame.contains("\"newlyGenerated\":2"));
        assert!(frame.contains("\"quota\":{\"used\":10,\"limit\":10,\"remaining\":0}"));
    }
}
