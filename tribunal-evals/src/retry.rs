// Copyright 2025 Tribunal (https://github.com/tribunal-evals/tribunal)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Per-evaluation retry wrapper.
//!
//! Decorates a judge with bounded exponential-backoff retry on
//! classified-retryable failures and a circuit breaker scoped to the
//! wrapper. The orchestrator constructs one wrapper per evaluate call,
//! so the breaker bounds a single evaluation's retry storm; it is not
//! shared across calls.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Judge, JudgeError};
use tribunal_core::{
    CircuitBreaker, CircuitStats, Criticality, Dimension, EvaluationContext, JudgeResult,
    RetryConfig,
};

/// Error-message fragments classified as transient, matched
/// case-insensitively. Deliberately broad to cope with heterogeneous
/// downstream error formats.
const RETRYABLE_FRAGMENTS: [&str; 8] = [
    "timeout",
    "temporary failure",
    "connection reset",
    "connection refused",
    "no such host",
    "i/o timeout",
    "rate limit",
    "too many requests",
];

/// A judge decorated with retry and a circuit breaker. Transparent:
/// identity, weight, and the rest of the contract delegate to the
/// wrapped judge; only `evaluate` changes behavior.
pub struct RetryingJudge {
    inner: Arc<dyn Judge>,
    config: RetryConfig,
    breaker: CircuitBreaker,
    cancel: CancellationToken,
}

impl RetryingJudge {
    /// Wrap `inner` with the given retry configuration. Zero-valued
    /// config fields resolve to defaults.
    pub fn new(inner: Arc<dyn Judge>, config: RetryConfig, cancel: CancellationToken) -> Self {
        let config = config.normalized();
        let breaker = CircuitBreaker::new(config.circuit_breaker.clone());
        Self {
            inner,
            config,
            breaker,
            cancel,
        }
    }

    /// Snapshot of the wrapper's breaker counters.
    pub fn circuit_stats(&self) -> CircuitStats {
        self.breaker.stats()
    }
}

#[async_trait]
impl Judge for RetryingJudge {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn weight(&self) -> f64 {
        self.inner.weight()
    }

    fn criticality(&self) -> Criticality {
        self.inner.criticality()
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.inner.dimensions()
    }

    fn criteria(&self) -> &str {
        self.inner.criteria()
    }

    // Already wrapped: never wrap again.
    fn retry_config(&self) -> Option<RetryConfig> {
        None
    }

    async fn evaluate(&self, context: &EvaluationContext) -> Result<JudgeResult, JudgeError> {
        if !self.breaker.allow_request() {
            return Err(JudgeError::CircuitOpen {
                stats: self.breaker.stats(),
            });
        }

        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.breaker.record_failure();
                    return Err(JudgeError::Cancelled(
                        "deadline elapsed while evaluating".to_string(),
                    ));
                }
                outcome = self.inner.evaluate(context) => outcome,
            };

            let error = match outcome {
                Ok(result) => {
                    self.breaker.record_success();
                    return Ok(result);
                }
                Err(error) => error,
            };

            if !is_retryable(&error, &self.config) {
                self.breaker.record_failure();
                return Err(JudgeError::NonRetryable {
                    source: Box::new(error),
                });
            }

            if attempt == self.config.max_attempts {
                self.breaker.record_failure();
                return Err(JudgeError::Exhausted {
                    attempts: attempt + 1,
                    source: Box::new(error),
                });
            }

            let backoff = self.config.backoff_for_attempt(attempt);
            debug!(
                judge_id = self.inner.id(),
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "retrying after transient failure: {}",
                error
            );

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.breaker.record_failure();
                    return Err(JudgeError::Cancelled(
                        "deadline elapsed during retry backoff".to_string(),
                    ));
                }
                _ = tokio::time::sleep(backoff) => {}
            }

            attempt += 1;
        }
    }
}

/// Wrap the judge for one evaluation when its config asks for retries.
pub(crate) fn wrap_for_evaluation(
    judge: Arc<dyn Judge>,
    cancel: &CancellationToken,
) -> Arc<dyn Judge> {
    match judge.retry_config() {
        Some(config) if config.max_attempts > 0 => {
            Arc::new(RetryingJudge::new(judge, config, cancel.clone()))
        }
        _ => judge,
    }
}

/// Transient-failure classifier: HTTP status in the configured set, a
/// deadline signal, a network-level condition, or a recognizably
/// transient error message.
pub(crate) fn is_retryable(error: &JudgeError, config: &RetryConfig) -> bool {
    match error {
        JudgeError::Cancelled(_) => false,
        JudgeError::Timeout => true,
        JudgeError::Transport { status, message } => {
            config.retries_status(*status) || message_is_retryable(message)
        }
        JudgeError::Http(err) => {
            err.is_timeout() || err.is_connect() || message_is_retryable(&err.to_string())
        }
        other => message_is_retryable(&other.to_string()),
    }
}

fn message_is_retryable(message: &str) -> bool {
    let lower = message.to_lowercase();
    RETRYABLE_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}
