//! Batch orchestration primitives
//!
//! The generation queue is cut into fixed-size ordered groups; each group
//! costs exactly one generation-service call. Failures are group-scoped:
//! the caller logs, counts the group as processed, and moves on.

use outreach_core::genai::{GenerationBackend, GenerationError};
use thiserror::Error;

use crate::prompt::{parse_batch_response, BatchParseError, BatchPayload, DraftItem};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("generation backend failed: {0}")]
    Backend(#[from] GenerationError),

    #[error(transparent)]
    Parse(#[from] BatchParseError),
}

/// Split `items` into groups of at most `size`, preserving order.
/// `size` is validated to be non-zero at config load.
pub fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut groups = Vec::new();
    let mut current = Vec::with_capacity(size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == size {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// Run one group: serialize the combined payload, invoke the backend once,
/// parse the positional response array.
pub async fn generate_group(
    backend: &dyn GenerationBackend,
    system_prompt: &str,
    payload: &BatchPayload,
) -> Result<Vec<DraftItem>, BatchError> {
    let body = payload.to_json().map_err(BatchParseError::from)?;
    let raw = backend.complete(system_prompt, &body).await?;
    let items = parse_batch_response(&raw, payload.prospects.len())?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PayloadProspect;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a canned response and records payload sizes per call.
    struct ScriptedBackend {
        response: String,
        calls: AtomicUsize,
        payload_sizes: Mutex<Vec<usize>>,
    }

    impl ScriptedBackend {
        fn new(response: &str) -> Self {
            Self {
                response: response.to_string(),
                calls: AtomicUsize::new(0),
                payload_sizes: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn complete(
            &self,
            _system_prompt: &str,
            user_payload: &str,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let parsed: serde_json::Value = serde_json::from_str(user_payload)
                .map_err(|_| GenerationError::MissingContent)?;
            let size = parsed["prospects"].as_array().map(|a| a.len()).unwrap_or(0);
            self.payload_sizes.lock().unwrap().push(size);
            Ok(self.response.clone())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn payload(n: usize) -> BatchPayload {
        BatchPayload {
            highlights: "built things".to_string(),
            prospects: (0..n)
                .map(|i| PayloadProspect {
                    company: format!("Company {i}"),
                    job_title: "Engineer".to_string(),
                    location: None,
                    contact_first_name: "Dana".to_string(),
                    challenges: vec!["churn".to_string()],
                })
                .collect(),
        }
    }

    #[test]
    fn test_chunk_preserves_order_with_partial_tail() {
        let groups = chunk(vec![1, 2, 3, 4, 5, 6, 7], 3);
        assert_eq!(groups, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
    }

    #[test]
    fn test_chunk_size_one() {
        let groups = chunk(vec!["a", "b"], 1);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_chunk_empty() {
        let groups: Vec<Vec<u8>> = chunk(vec![], 3);
        assert!(groups.is_empty());
    }

    #[tokio::test]
    async fn test_generate_group_parses_positional_response() {
        let backend = ScriptedBackend::new(
            r#"[{"subject":"s1","message":"m1"},{"subject":"s2","message":"m2"}]"#,
        );
        let items = generate_group(&backend, "system", &payload(2)).await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].subject, "s1");
        assert_eq!(items[1].message, "m2");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generate_group_length_mismatch_is_group_failure() {
        let backend = ScriptedBackend::new(r#"[{"subject":"s1","message":"m1"}]"#);
        let err = generate_group(&backend, "system", &payload(2)).await.unwrap_err();
        assert!(matches!(
            err,
            BatchError::Parse(BatchParseError::LengthMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_generate_group_malformed_response_is_group_failure() {
        let backend = ScriptedBackend::new("sorry, I can't do that");
        let err = generate_group(&backend, "system", &payload(1)).await.unwrap_err();
        assert!(matches!(err, BatchError::Parse(BatchParseError::Json(_))));
    }
}
