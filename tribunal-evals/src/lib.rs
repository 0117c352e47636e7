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

//! # Tribunal evaluation engine
//!
//! A multi-judge evaluation orchestrator for LLM agent responses.
//!
//! ## Features
//!
//! - **Trait-based judge system**: any `Judge` implementation can join a
//!   panel; an LLM-backed judge ships in [`judges`]
//! - **Thread-safe registry**: register/unregister judges, filter by
//!   criticality or dimension
//! - **Resilient execution**: per-evaluation retry with exponential
//!   backoff and a circuit breaker around each wrapped judge
//! - **Six aggregation strategies**: weighted average, all-must-pass,
//!   majority, any-pass, min and max score
//! - **Three execution modes**: synchronous, asynchronous, and hybrid
//!   (critical judges block, non-critical judges run detached)
//! - **Streaming progress**: best-effort per-judge start/finish events
//!   over an mpsc channel
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tribunal_core::{AggregationStrategy, EvaluationContext, ExecutionMode};
//! use tribunal_evals::judges::{LlmJudge, LlmJudgeConfig};
//! use tribunal_evals::llm_client::OpenAiClient;
//! use tribunal_evals::{EvaluateRequest, JudgeRegistry, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = Arc::new(JudgeRegistry::new());
//!     let client = Arc::new(OpenAiClient::new(
//!         std::env::var("OPENAI_API_KEY").unwrap(),
//!         "gpt-4o-mini".to_string(),
//!     ));
//!     let judge = LlmJudge::new(LlmJudgeConfig::new("accuracy_v1", "Accuracy"), client);
//!     registry.register(Arc::new(judge)).unwrap();
//!
//!     let orchestrator = Orchestrator::new(registry);
//!     let ctx = EvaluationContext::new("What is 2+2?", "4");
//!     let request = EvaluateRequest::new(
//!         vec!["accuracy_v1".to_string()],
//!         AggregationStrategy::WeightedAverage,
//!         ExecutionMode::Synchronous,
//!     );
//!     let response = orchestrator.evaluate(&ctx, &request).await.unwrap();
//!     println!("pass={} score={:.1}", response.pass, response.final_score);
//! }
//! ```

#[cfg(test)]
#[macro_use]
extern crate tokio_test;

use async_trait::async_trait;
use thiserror::Error;

use tribunal_core::{
    CircuitStats, Criticality, Dimension, EvaluationContext, JudgeResult, RetryConfig,
};

pub mod aggregator;
pub mod exporter;
pub mod judges;
pub mod llm_client;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod retry;

pub use aggregator::{aggregate, derive_verdict, format_failures};
pub use exporter::{ExportError, HttpExporter, VerdictExporter};
pub use orchestrator::{
    EvaluateRequest, EvaluateResponse, EvaluationError, EvaluationMetadata, Orchestrator,
};
pub use progress::{ProgressSink, ProgressUpdate};
pub use registry::{JudgeDescriptor, JudgeRegistry, RegistryError};
pub use retry::RetryingJudge;

/// Core contract all judges implement.
///
/// A judge scores one agent exchange on one or more dimensions and
/// returns a verdict. Identity must be nonempty and stable for the
/// judge's lifetime; weight must be nonnegative.
#[async_trait]
pub trait Judge: Send + Sync {
    /// Stable unique identifier (e.g., "accuracy_v1").
    fn id(&self) -> &str;

    /// Human-readable name shown in failure summaries.
    fn name(&self) -> &str {
        self.id()
    }

    /// Aggregation weight under the weighted-average strategy.
    fn weight(&self) -> f64 {
        1.0
    }

    /// Scheduling severity. LLM-backed judges default to critical;
    /// agent-backed judges should override with non-critical.
    fn criticality(&self) -> Criticality {
        Criticality::Critical
    }

    /// Dimensions this judge scores.
    fn dimensions(&self) -> Vec<Dimension> {
        vec![Dimension::Quality]
    }

    /// Free-form criteria text applied by this judge.
    fn criteria(&self) -> &str {
        ""
    }

    /// Retry configuration. Returning `None`, or a config with
    /// `max_attempts == 0`, disables the per-evaluation retry wrapper.
    fn retry_config(&self) -> Option<RetryConfig> {
        None
    }

    /// Evaluate a single context.
    async fn evaluate(&self, context: &EvaluationContext) -> Result<JudgeResult, JudgeError>;
}

/// Errors surfaced from a single judge's evaluate path.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP-status-bearing failure from the judge's downstream.
    #[error("upstream returned status {status}: {message}")]
    Transport { status: u16, message: String },

    /// A per-attempt deadline fired downstream; classified retryable.
    #[error("evaluation timed out")]
    Timeout,

    /// The evaluation's own deadline elapsed or the caller went away.
    #[error("evaluation cancelled: {0}")]
    Cancelled(String),

    /// The circuit breaker refused to invoke the judge.
    #[error("circuit breaker rejected request ({stats})")]
    CircuitOpen { stats: CircuitStats },

    /// The underlying judge failed with a cause the retry classifier
    /// deems permanent.
    #[error("non-retryable judge failure: {source}")]
    NonRetryable {
        #[source]
        source: Box<JudgeError>,
    },

    /// Every retry attempt failed; wraps the last cause.
    #[error("judge evaluation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: Box<JudgeError>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl JudgeError {
    /// Whether this error counts as a deadline/cancellation outcome in
    /// evaluation metadata.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JudgeError::Timeout | JudgeError::Cancelled(_))
    }
}
