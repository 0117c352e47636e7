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

//! Top-level evaluation coordinator.
//!
//! Resolves judge identities, fans out one task per judge, applies the
//! deadline and fail-fast policy, aggregates the verdict batch, and
//! optionally exports verdicts downstream. Verdicts reach the
//! aggregator in completion order; every aggregation strategy is
//! order-insensitive, and only the suggestion list's first-seen order
//! can vary across runs.

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::aggregator::{aggregate, derive_verdict};
use crate::exporter::VerdictExporter;
use crate::progress::{try_emit, ProgressSink, ProgressUpdate};
use crate::registry::{JudgeRegistry, RegistryError};
use crate::retry::wrap_for_evaluation;
use crate::{Judge, JudgeError};
use tribunal_core::{
    AggregatedMetrics, AggregationStrategy, EvaluationContext, ExecutionMode, JudgeResult,
    VerdictLabel,
};

/// One evaluation request: which judges, how to combine them, how to
/// schedule them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub judge_ids: Vec<String>,
    pub strategy: AggregationStrategy,
    pub execution_mode: ExecutionMode,
    /// Evaluation deadline in seconds; 0 disables it.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Abort on the first judge error. Honored in synchronous mode only.
    #[serde(default)]
    pub fail_fast: bool,
    /// Submit each verdict to the configured exporter.
    #[serde(default)]
    pub export: bool,
}

impl EvaluateRequest {
    pub fn new(
        judge_ids: Vec<String>,
        strategy: AggregationStrategy,
        execution_mode: ExecutionMode,
    ) -> Self {
        Self {
            judge_ids,
            strategy,
            execution_mode,
            timeout_seconds: 0,
            fail_fast: false,
            export: false,
        }
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    pub fn with_export(mut self, export: bool) -> Self {
        self.export = export;
        self
    }
}

/// Consolidated outcome of one evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    /// True iff the final verdict is PASS.
    pub pass: bool,
    /// Final textual verdict derived from the aggregate.
    pub verdict: VerdictLabel,
    /// Verdict batch, in completion order.
    pub verdicts: Vec<JudgeResult>,
    /// Average score per dimension across the batch.
    pub dimension_scores: HashMap<String, f64>,
    /// Final score of the chosen strategy.
    pub final_score: f64,
    /// Human-readable summary of the outcome.
    pub explanation: String,
    /// Suggestions deduplicated across verdicts, first-seen order.
    pub suggestions: Vec<String>,
    pub metrics: AggregatedMetrics,
    pub metadata: EvaluationMetadata,
}

/// Bookkeeping attached to every response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    /// Judges evaluated on the blocking path.
    pub total_judges: usize,
    /// Verdicts labeled PASS.
    pub passed_judges: usize,
    /// Verdicts labeled FAIL plus judges dropped for non-deadline errors.
    pub failed_judges: usize,
    /// Judges dropped because the deadline elapsed.
    pub timed_out_judges: usize,
    pub execution_mode: ExecutionMode,
    pub total_cost_usd: f64,
    /// Wallclock for the whole evaluation.
    pub total_execution_time_ms: u64,
    /// Whether at least one verdict reached the exporter.
    pub exported: bool,
}

/// Errors surfaced from an evaluation as a whole.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("judge {judge_id} failed with fail-fast enabled: {source}")]
    FailFast {
        judge_id: String,
        #[source]
        source: JudgeError,
    },
}

struct FanOutOutcome {
    verdicts: Vec<JudgeResult>,
    weights: HashMap<String, f64>,
    dropped_errors: usize,
    dropped_timeouts: usize,
    total_judges: usize,
}

/// Coordinates judge fan-out, aggregation, and export.
pub struct Orchestrator {
    registry: Arc<JudgeRegistry>,
    exporter: Option<Arc<dyn VerdictExporter>>,
}

impl Orchestrator {
    pub fn new(registry: Arc<JudgeRegistry>) -> Self {
        Self {
            registry,
            exporter: None,
        }
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn VerdictExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Evaluate without progress streaming.
    pub async fn evaluate(
        &self,
        context: &EvaluationContext,
        request: &EvaluateRequest,
    ) -> Result<EvaluateResponse, EvaluationError> {
        self.run(context, request, None).await
    }

    /// Evaluate, streaming per-judge progress to `progress`. Sends are
    /// best-effort; the sink is sized and closed by the caller.
    pub async fn evaluate_stream(
        &self,
        context: &EvaluationContext,
        request: &EvaluateRequest,
        progress: ProgressSink,
    ) -> Result<EvaluateResponse, EvaluationError> {
        self.run(context, request, Some(progress)).await
    }

    async fn run(
        &self,
        context: &EvaluationContext,
        request: &EvaluateRequest,
        progress: Option<ProgressSink>,
    ) -> Result<EvaluateResponse, EvaluationError> {
        let started = Instant::now();
        let evaluation_id = uuid::Uuid::new_v4();
        info!(
            evaluation_id = %evaluation_id,
            judges = request.judge_ids.len(),
            mode = ?request.execution_mode,
            strategy = request.strategy.as_str(),
            "starting evaluation"
        );

        let judges = self.registry.get_many(&request.judge_ids)?;

        let cancel = CancellationToken::new();
        if request.timeout_seconds > 0 {
            let token = cancel.clone();
            let deadline = Duration::from_secs(request.timeout_seconds);
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                token.cancel();
            });
        }

        let outcome = match request.execution_mode {
            ExecutionMode::Synchronous => {
                self.fan_out(context, judges, &cancel, request.fail_fast, progress.as_ref())
                    .await?
            }
            // Asynchronous mode ignores fail-fast.
            ExecutionMode::Asynchronous => {
                self.fan_out(context, judges, &cancel, false, progress.as_ref())
                    .await?
            }
            ExecutionMode::Hybrid => {
                let (critical, non_critical): (Vec<_>, Vec<_>) = judges
                    .into_iter()
                    .partition(|judge| judge.criticality().is_critical());

                let outcome = self
                    .fan_out(context, critical, &cancel, false, progress.as_ref())
                    .await?;

                // Non-critical work detaches either way; only the
                // critical verdicts shape the response.
                if !non_critical.is_empty() {
                    self.spawn_detached(context, non_critical);
                }

                let critical_failure = outcome
                    .verdicts
                    .iter()
                    .any(|verdict| verdict.verdict != VerdictLabel::Pass);
                if request.strategy == AggregationStrategy::AllMustPass && critical_failure {
                    warn!(evaluation_id = %evaluation_id, "critical judges failed, exiting early");
                    return Ok(self
                        .finish(
                            context,
                            request,
                            outcome,
                            progress.as_ref(),
                            started,
                            Some("Critical judges failed (all-must-pass mode)".to_string()),
                        )
                        .await);
                }
                outcome
            }
        };

        Ok(self
            .finish(context, request, outcome, progress.as_ref(), started, None)
            .await)
    }

    /// Fan out one task per judge, collecting verdicts as they complete.
    async fn fan_out(
        &self,
        context: &EvaluationContext,
        judges: Vec<Arc<dyn Judge>>,
        cancel: &CancellationToken,
        fail_fast: bool,
        progress: Option<&ProgressSink>,
    ) -> Result<FanOutOutcome, EvaluationError> {
        let total_judges = judges.len();
        let mut weights = HashMap::with_capacity(total_judges);
        let mut tasks = JoinSet::new();

        for judge in judges {
            weights.insert(judge.id().to_string(), judge.weight());

            let judge_id = judge.id().to_string();
            let context = context.clone();
            let cancel = cancel.clone();
            let progress = progress.cloned();
            let target = wrap_for_evaluation(judge, &cancel);

            tasks.spawn(async move {
                // Emitted on this task's own stack so Started always
                // precedes the matching Completed.
                try_emit(
                    progress.as_ref(),
                    ProgressUpdate::JudgeStarted {
                        judge_id: judge_id.clone(),
                        example_number: 0,
                        started_at: Utc::now(),
                    },
                );

                let start = Instant::now();
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => Err(JudgeError::Cancelled(
                        "evaluation deadline elapsed".to_string(),
                    )),
                    outcome = target.evaluate(&context) => outcome,
                };
                let duration_ms = start.elapsed().as_millis() as u64;

                if let Ok(result) = &outcome {
                    try_emit(
                        progress.as_ref(),
                        ProgressUpdate::JudgeCompleted {
                            judge_id: judge_id.clone(),
                            example_number: 0,
                            result: result.clone(),
                            duration_ms,
                        },
                    );
                }

                (judge_id, outcome, duration_ms)
            });
        }

        let mut verdicts = Vec::with_capacity(total_judges);
        let mut dropped_errors = 0usize;
        let mut dropped_timeouts = 0usize;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(mut result), duration_ms)) => {
                    if result.execution_time_ms == 0 {
                        result.execution_time_ms = duration_ms;
                    }
                    verdicts.push(result);
                }
                Ok((judge_id, Err(error), _)) => {
                    if fail_fast {
                        // Dropping the JoinSet aborts in-flight tasks;
                        // their results are discarded.
                        return Err(EvaluationError::FailFast {
                            judge_id,
                            source: error,
                        });
                    }
                    if error.is_cancellation() {
                        dropped_timeouts += 1;
                    } else {
                        dropped_errors += 1;
                    }
                    warn!(judge_id = %judge_id, "judge dropped from batch: {}", error);
                }
                Err(join_error) => {
                    let error = JudgeError::Internal(format!("judge task panicked: {join_error}"));
                    if fail_fast {
                        return Err(EvaluationError::FailFast {
                            judge_id: "unknown".to_string(),
                            source: error,
                        });
                    }
                    dropped_errors += 1;
                    warn!("judge dropped from batch: {}", error);
                }
            }
        }

        Ok(FanOutOutcome {
            verdicts,
            weights,
            dropped_errors,
            dropped_timeouts,
            total_judges,
        })
    }

    /// Evaluate non-critical judges detached from the caller's deadline.
    /// Telemetry only: results never reach the response or the sink.
    fn spawn_detached(&self, context: &EvaluationContext, judges: Vec<Arc<dyn Judge>>) {
        let context = context.clone();
        tokio::spawn(async move {
            let detached = CancellationToken::new();
            let evaluations: Vec<_> = judges
                .into_iter()
                .map(|judge| {
                    let context = context.clone();
                    let target = wrap_for_evaluation(judge, &detached);
                    async move {
                        let judge_id = target.id().to_string();
                        match target.evaluate(&context).await {
                            Ok(result) => info!(
                                judge_id = %judge_id,
                                score = result.score,
                                verdict = %result.verdict,
                                "non-critical judge completed"
                            ),
                            Err(error) => warn!(
                                judge_id = %judge_id,
                                "non-critical judge failed: {}",
                                error
                            ),
                        }
                    }
                })
                .collect();
            join_all(evaluations).await;
        });
    }

    async fn finish(
        &self,
        context: &EvaluationContext,
        request: &EvaluateRequest,
        outcome: FanOutOutcome,
        progress: Option<&ProgressSink>,
        started: Instant,
        explanation_override: Option<String>,
    ) -> EvaluateResponse {
        let metrics = aggregate(&outcome.verdicts, &outcome.weights, request.strategy);
        let verdict = derive_verdict(&metrics);

        let passed = outcome
            .verdicts
            .iter()
            .filter(|v| v.verdict.is_pass())
            .count();
        let failed_in_batch = outcome
            .verdicts
            .iter()
            .filter(|v| v.verdict == VerdictLabel::Fail)
            .count();

        let explanation = explanation_override.unwrap_or_else(|| {
            build_explanation(request.strategy, &metrics, passed, outcome.total_judges)
        });

        let exported = if request.export {
            self.export_verdicts(context, &outcome.verdicts).await
        } else {
            false
        };

        let metadata = EvaluationMetadata {
            total_judges: outcome.total_judges,
            passed_judges: passed,
            failed_judges: failed_in_batch + outcome.dropped_errors,
            timed_out_judges: outcome.dropped_timeouts,
            execution_mode: request.execution_mode,
            total_cost_usd: metrics.total_cost_usd,
            total_execution_time_ms: started.elapsed().as_millis() as u64,
            exported,
        };

        let response = EvaluateResponse {
            pass: verdict.is_pass(),
            verdict,
            dimension_scores: metrics.dimension_averages.clone(),
            final_score: metrics.weighted_average_score,
            explanation,
            suggestions: dedup_suggestions(&outcome.verdicts),
            verdicts: outcome.verdicts,
            metrics,
            metadata,
        };

        try_emit(
            progress,
            ProgressUpdate::EvaluationCompleted {
                final_result: Box::new(response.clone()),
                total_duration_ms: started.elapsed().as_millis() as u64,
            },
        );

        info!(
            pass = response.pass,
            final_score = response.final_score,
            judges = response.metadata.total_judges,
            "evaluation finished"
        );

        response
    }

    /// Submit each verdict once. Failures are logged and swallowed; the
    /// return value reports whether anything got through.
    async fn export_verdicts(
        &self,
        context: &EvaluationContext,
        verdicts: &[JudgeResult],
    ) -> bool {
        let Some(exporter) = &self.exporter else {
            return false;
        };

        let mut exported = false;
        for verdict in verdicts {
            match exporter.export(context, verdict).await {
                Ok(()) => exported = true,
                Err(error) => {
                    warn!(judge_id = %verdict.judge_id, "verdict export failed: {}", error);
                }
            }
        }
        exported
    }
}

fn build_explanation(
    strategy: AggregationStrategy,
    metrics: &AggregatedMetrics,
    passed: usize,
    total: usize,
) -> String {
    match strategy {
        AggregationStrategy::WeightedAverage => format!(
            "Weighted average score: {:.1}/100 ({}/{} judges passed)",
            metrics.weighted_average_score, passed, total
        ),
        AggregationStrategy::AllMustPass => {
            if passed == total {
                format!("All {total} judges passed")
            } else {
                format!("{}/{} judges failed (all-must-pass)", total - passed, total)
            }
        }
        AggregationStrategy::MajorityPass => format!(
            "Majority vote: {}/{} judges passed ({:.0}%)",
            passed,
            total,
            metrics.pass_rate * 100.0
        ),
        AggregationStrategy::MinScore => format!(
            "Minimum score: {:.1}/100 (strictest judge)",
            metrics.min_score
        ),
        AggregationStrategy::MaxScore => {
            format!("Maximum score: {:.1}/100 (best judge)", metrics.max_score)
        }
        AggregationStrategy::AnyPass | AggregationStrategy::Unspecified => {
            format!("{passed}/{total} judges passed")
        }
    }
}

/// Deduplicate suggestions across the batch, preserving first-seen
/// order. The batch arrives in completion order, so the list can
/// reorder across runs.
fn dedup_suggestions(verdicts: &[JudgeResult]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut suggestions = Vec::new();
    for verdict in verdicts {
        for suggestion in &verdict.suggestions {
            if seen.insert(suggestion.clone()) {
                suggestions.push(suggestion.clone());
            }
        }
    }
    suggestions
}
