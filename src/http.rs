//! JSON-over-HTTP calls to model backends, with timeout and retry.
//!
//! Failure classification:
//! - HTTP 429 and 5xx → [`RagError::BackendUnavailable`], retried
//! - network errors → [`RagError::BackendUnavailable`], retried
//! - client timeout → [`RagError::BackendTimeout`], retried
//! - other 4xx, undecodable body → [`RagError::BackendResponse`], not retried
//!
//! Backoff between attempts: 1s, 2s, 4s, ... capped at 32s.

use std::time::Duration;

use facility_rag_core::{Backend, RagError};
use serde_json::Value;

/// Per-backend timeout and retry settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backend: Backend,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl RetryPolicy {
    pub fn client(&self) -> Result<reqwest::Client, RagError> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| RagError::BackendUnavailable {
                backend: self.backend,
                message: format!("failed to build HTTP client: {}", e),
            })
    }

    fn transport_error(&self, err: reqwest::Error) -> RagError {
        if err.is_timeout() {
            RagError::BackendTimeout {
                backend: self.backend,
                timeout_secs: self.timeout_secs,
            }
        } else {
            RagError::BackendUnavailable {
                backend: self.backend,
                message: err.to_string(),
            }
        }
    }

    pub fn bad_response(&self, message: impl Into<String>) -> RagError {
        RagError::BackendResponse {
            backend: self.backend,
            message: message.into(),
        }
    }
}

/// POST `body` to `url` and decode the JSON reply.
pub async fn post_json(
    client: &reqwest::Client,
    policy: &RetryPolicy,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
) -> Result<Value, RagError> {
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(backend = %policy.backend, attempt, ?delay, "retrying backend call");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                let err = policy.transport_error(e);
                tracing::warn!(backend = %policy.backend, attempt, error = %err, "backend call failed");
                last_err = Some(err);
                continue;
            }
        };

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| {
                if e.is_timeout() {
                    policy.transport_error(e)
                } else {
                    policy.bad_response(format!("undecodable body: {}", e))
                }
            });
        }

        let body_text = response.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            let err = RagError::BackendUnavailable {
                backend: policy.backend,
                message: format!("HTTP {}: {}", status, body_text),
            };
            tracing::warn!(backend = %policy.backend, attempt, error = %err, "backend call failed");
            last_err = Some(err);
            continue;
        }

        return Err(policy.bad_response(format!("HTTP {}: {}", status, body_text)));
    }

    Err(last_err.unwrap_or_else(|| RagError::BackendUnavailable {
        backend: policy.backend,
        message: "no attempt was made".into(),
    }))
}

/// Read a JSON array of numbers as a vector.
pub fn parse_vector(value: &Value, policy: &RetryPolicy) -> Result<Vec<f32>, RagError> {
    let items = value
        .as_array()
        .ok_or_else(|| policy.bad_response("embedding is not an array"))?;
    items
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| policy.bad_response("embedding contains a non-number"))
        })
        .collect()
}
