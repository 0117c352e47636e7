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

//! Retry and circuit-breaker configuration.
//!
//! Zero-valued fields are treated as "unset" and resolve to defaults via
//! [`RetryConfig::normalized`] / [`CircuitBreakerConfig::normalized`],
//! so partially-populated configs behave predictably.

use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(8);
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// HTTP statuses retried by default: rate limiting and transient
/// upstream failures.
pub const DEFAULT_RETRY_ON_STATUS: [u16; 4] = [429, 500, 502, 503];

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;

/// Bounded exponential-backoff retry configuration for a judge.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Number of retries after the initial attempt. A judge configured
    /// with `max_attempts = 2` is invoked up to 3 times.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    /// HTTP statuses classified as retryable.
    pub retry_on_status: Vec<u16>,
    /// Breaker guarding the wrapped judge's evaluate path.
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            retry_on_status: DEFAULT_RETRY_ON_STATUS.to_vec(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RetryConfig {
    /// Resolve zero-valued fields to their defaults.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.max_attempts == 0 {
            config.max_attempts = DEFAULT_MAX_ATTEMPTS;
        }
        if config.initial_backoff.is_zero() {
            config.initial_backoff = DEFAULT_INITIAL_BACKOFF;
        }
        if config.max_backoff.is_zero() {
            config.max_backoff = DEFAULT_MAX_BACKOFF;
        }
        if config.backoff_multiplier <= 0.0 {
            config.backoff_multiplier = DEFAULT_BACKOFF_MULTIPLIER;
        }
        if config.retry_on_status.is_empty() {
            config.retry_on_status = DEFAULT_RETRY_ON_STATUS.to_vec();
        }
        config.circuit_breaker = config.circuit_breaker.normalized();
        config
    }

    /// Backoff before retry `attempt` (0-based):
    /// `min(initial × multiplier^attempt, max)`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Whether the given HTTP status is configured as retryable.
    pub fn retries_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

/// Three-state circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in CLOSED before opening.
    pub failure_threshold: u32,
    /// How long OPEN rejects before admitting a half-open probe.
    pub reset_timeout: Duration,
    /// Successes in HALF_OPEN before closing.
    pub success_threshold: u32,
    /// A disabled breaker admits everything and records nothing.
    pub enabled: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            reset_timeout: DEFAULT_RESET_TIMEOUT,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            enabled: true,
        }
    }
}

impl CircuitBreakerConfig {
    /// Resolve zero-valued thresholds to their defaults.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.failure_threshold == 0 {
            config.failure_threshold = DEFAULT_FAILURE_THRESHOLD;
        }
        if config.reset_timeout.is_zero() {
            config.reset_timeout = DEFAULT_RESET_TIMEOUT;
        }
        if config.success_threshold == 0 {
            config.success_threshold = DEFAULT_SUCCESS_THRESHOLD;
        }
        config
    }
}
