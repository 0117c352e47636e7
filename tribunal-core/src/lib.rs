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

//! # Tribunal core
//!
//! Shared data model and resilience primitives for the Tribunal
//! multi-judge evaluation orchestrator:
//!
//! - **Evaluation inputs**: [`EvaluationContext`] carries the agent
//!   exchange under judgment plus observed execution metadata.
//! - **Verdicts**: [`JudgeResult`] is a single judge's scored opinion;
//!   [`AggregatedMetrics`] is the combined view over a verdict batch.
//! - **Classification**: [`Criticality`] and [`Dimension`] tag judges for
//!   scheduling and score bookkeeping.
//! - **Resilience**: [`CircuitBreaker`] isolates a persistently failing
//!   judge; [`RetryConfig`] bounds retry cost.
//!
//! The execution engine (judge trait, registry, retry wrapper,
//! orchestrator) lives in the `tribunal-evals` crate.

pub mod config;
pub mod context;
pub mod resilience;
pub mod strategy;
pub mod types;
pub mod verdict;

pub use config::{CircuitBreakerConfig, RetryConfig};
pub use context::EvaluationContext;
pub use resilience::{CircuitBreaker, CircuitState, CircuitStats};
pub use strategy::{AggregatedMetrics, AggregationStrategy, ExecutionMode};
pub use types::{Criticality, Dimension, InvalidDimension};
pub use verdict::{JudgeResult, SubScores, VerdictLabel};
