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

//! Aggregation strategies, execution modes, and the aggregate view over
//! a verdict batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Policy for combining a batch of verdicts into a single outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// No policy chosen; aggregates to an unweighted mean and always
    /// yields a PARTIAL final verdict.
    Unspecified,
    WeightedAverage,
    AllMustPass,
    MajorityPass,
    AnyPass,
    MinScore,
    MaxScore,
}

impl AggregationStrategy {
    /// Stable tag used in logs and exported aggregates.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationStrategy::Unspecified => "unspecified",
            AggregationStrategy::WeightedAverage => "weighted_average",
            AggregationStrategy::AllMustPass => "all_must_pass",
            AggregationStrategy::MajorityPass => "majority_pass",
            AggregationStrategy::AnyPass => "any_pass",
            AggregationStrategy::MinScore => "min_score",
            AggregationStrategy::MaxScore => "max_score",
        }
    }
}

/// How the orchestrator schedules judge fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Fan out all judges and wait for every result; honors fail-fast.
    #[default]
    Synchronous,
    /// Same fan-out, fail-fast ignored.
    Asynchronous,
    /// Critical judges block, non-critical judges run detached.
    Hybrid,
}

/// Aggregate metrics computed over a verdict batch under one strategy.
///
/// Under `MinScore`/`MaxScore`, `weighted_average_score` carries the
/// min/max value: consumers read it as "final score of the chosen
/// strategy", not strictly as a weighted average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatedMetrics {
    /// Strategy that produced this aggregate.
    pub strategy: AggregationStrategy,

    /// Final score of the chosen strategy, in [0, 100].
    pub weighted_average_score: f64,

    /// Lowest overall score in the batch.
    pub min_score: f64,

    /// Highest overall score in the batch.
    pub max_score: f64,

    /// Population standard deviation of overall scores; 0 for fewer than
    /// two verdicts.
    pub std_deviation: f64,

    /// Fraction of verdicts labeled PASS, in [0, 1].
    pub pass_rate: f64,

    /// Sum of per-judge execution times.
    pub total_execution_time_ms: u64,

    /// Sum of per-judge costs.
    pub total_cost_usd: f64,

    /// Average score per dimension, divided by the count of verdicts
    /// that reported the dimension.
    pub dimension_averages: HashMap<String, f64>,
}

impl AggregatedMetrics {
    /// The aggregate of an empty batch: only the strategy tag populated.
    pub fn empty(strategy: AggregationStrategy) -> Self {
        Self {
            strategy,
            weighted_average_score: 0.0,
            min_score: 0.0,
            max_score: 0.0,
            std_deviation: 0.0,
            pass_rate: 0.0,
            total_execution_time_ms: 0,
            total_cost_usd: 0.0,
            dimension_averages: HashMap::new(),
        }
    }
}
