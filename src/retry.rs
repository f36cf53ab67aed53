use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::domain::ModelId;
use crate::error::HarvestError;

pub const DEFAULT_TRANSIENT_FIELD: &str = "Message";
pub const DEFAULT_TRANSIENT_MESSAGE: &str = "An error has occurred.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientErrorMatcher {
    field: String,
    message: String,
}

impl TransientErrorMatcher {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn matches(&self, body: &Value) -> bool {
        body.get(&self.field)
            .and_then(|value| value.as_str())
            .is_some_and(|value| value == self.message)
    }
}

impl Default for TransientErrorMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSIENT_FIELD, DEFAULT_TRANSIENT_MESSAGE)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub matcher: TransientErrorMatcher,
    pub delay: Duration,
    pub max_retries: Option<u32>,
}

enum FetchState {
    Attempting { retries: u32 },
    Settled { body: Value, retries: u32 },
}

#[derive(Debug)]
pub struct Settled {
    pub body: Value,
    pub retries: u32,
}

impl RetryPolicy {
    pub fn fetch<F, R>(
        &self,
        id: ModelId,
        mut request: F,
        mut on_retry: R,
    ) -> Result<Settled, HarvestError>
    where
        F: FnMut() -> Result<Value, HarvestError>,
        R: FnMut(u32),
    {
        let mut state = FetchState::Attempting { retries: 0 };
        loop {
            state = match state {
                FetchState::Settled { body, retries } => return Ok(Settled { body, retries }),
                FetchState::Attempting { retries } => {
                    let body = request()?;
                    if !self.matcher.matches(&body) {
                        FetchState::Settled { body, retries }
                    } else if self.max_retries.is_some_and(|max| retries >= max) {
                        return Err(HarvestError::RetriesExhausted {
                            id,
                            attempts: retries + 1,
                        });
                    } else {
                        warn!(
                            model_id = %id,
                            delay_secs = self.delay.as_secs_f64(),
                            "errored with {id}; sleeping before trying again"
                        );
                        on_retry(retries + 1);
                        thread::sleep(self.delay);
                        FetchState::Attempting {
                            retries: retries + 1,
                        }
                    }
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn policy(max_retries: Option<u32>) -> RetryPolicy {
        RetryPolicy {
            matcher: TransientErrorMatcher::default(),
            delay: Duration::ZERO,
            max_retries,
        }
    }

    #[test]
    fn matcher_requires_exact_message() {
        let matcher = TransientErrorMatcher::default();
        assert!(matcher.matches(&json!({"Message": "An error has occurred."})));
        assert!(!matcher.matches(&json!({"Message": "Not found"})));
        assert!(!matcher.matches(&json!({"object_name": "An error has occurred."})));
    }

    #[test]
    fn matcher_field_is_configurable() {
        let matcher = TransientErrorMatcher::new("error", "busy");
        assert!(matcher.matches(&json!({"error": "busy"})));
        assert!(!matcher.matches(&json!({"Message": "An error has occurred."})));
    }

    #[test]
    fn retries_until_settled() {
        let mut responses = VecDeque::from(vec![
            json!({"Message": "An error has occurred."}),
            json!({"Message": "An error has occurred."}),
            json!({"object_name": "M2"}),
        ]);
        let mut seen = Vec::new();
        let settled = policy(None)
            .fetch(
                ModelId::new(102),
                || Ok(responses.pop_front().unwrap()),
                |attempt| seen.push(attempt),
            )
            .unwrap();
        assert_eq!(settled.retries, 2);
        assert_eq!(seen, vec![1, 2]);
        assert_eq!(settled.body["object_name"], "M2");
    }

    #[test]
    fn capped_retries_give_up() {
        let err = policy(Some(1))
            .fetch(
                ModelId::new(7),
                || Ok(json!({"Message": "An error has occurred."})),
                |_| {},
            )
            .unwrap_err();
        assert_matches!(err, HarvestError::RetriesExhausted { attempts: 2, .. });
    }

    #[test]
    fn request_errors_are_not_retried() {
        let mut calls = 0;
        let err = policy(None)
            .fetch(
                ModelId::new(7),
                || {
                    calls += 1;
                    Err(HarvestError::Http("connection reset".to_string()))
                },
                |_| {},
            )
            .unwrap_err();
        assert_matches!(err, HarvestError::Http(_));
        assert_eq!(calls, 1);
    }
}
