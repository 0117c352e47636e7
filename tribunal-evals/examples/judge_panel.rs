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

//! Runs a two-judge panel over a canned agent exchange, streaming
//! progress, without any network access.
//!
//! ```sh
//! cargo run --example judge_panel
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use tribunal_core::{AggregationStrategy, EvaluationContext, ExecutionMode, JudgeResult,
    VerdictLabel};
use tribunal_evals::{
    EvaluateRequest, Judge, JudgeError, JudgeRegistry, Orchestrator, ProgressUpdate,
};

/// Toy judge that scores the response by crude length heuristics.
struct LengthJudge {
    id: String,
    min_words: usize,
}

#[async_trait]
impl Judge for LengthJudge {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        "Length heuristic"
    }

    async fn evaluate(&self, context: &EvaluationContext) -> Result<JudgeResult, JudgeError> {
        let words = context.response.split_whitespace().count();
        let score = (words as f64 / self.min_words as f64 * 100.0).min(100.0);

        let mut result = JudgeResult::new(&self.id, self.name());
        result.score = score;
        result.verdict = if score >= 60.0 {
            VerdictLabel::Pass
        } else {
            VerdictLabel::Fail
        };
        result.reasoning = format!("{words} words against a target of {}", self.min_words);
        if words < self.min_words {
            result
                .suggestions
                .push("expand the answer with supporting detail".to_string());
        }
        Ok(result)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let registry = Arc::new(JudgeRegistry::new());
    registry.register(Arc::new(LengthJudge {
        id: "length_strict".to_string(),
        min_words: 20,
    }))?;
    registry.register(Arc::new(LengthJudge {
        id: "length_lenient".to_string(),
        min_words: 5,
    }))?;

    let orchestrator = Orchestrator::new(Arc::clone(&registry));
    let context = EvaluationContext::new(
        "Why is the sky blue?",
        "Sunlight scatters off air molecules, and shorter blue wavelengths scatter the most, \
         so the sky looks blue to us.",
    );

    let (tx, mut rx) = mpsc::channel(16);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            match update {
                ProgressUpdate::JudgeStarted { judge_id, .. } => {
                    println!("-> {judge_id} started");
                }
                ProgressUpdate::JudgeCompleted {
                    judge_id, result, ..
                } => {
                    println!("<- {judge_id}: {} ({:.1})", result.verdict, result.score);
                }
                ProgressUpdate::EvaluationCompleted {
                    total_duration_ms, ..
                } => {
                    println!("evaluation completed in {total_duration_ms} ms");
                }
            }
        }
    });

    let request = EvaluateRequest::new(
        vec!["length_strict".to_string(), "length_lenient".to_string()],
        AggregationStrategy::WeightedAverage,
        ExecutionMode::Synchronous,
    );
    let response = orchestrator
        .evaluate_stream(&context, &request, tx)
        .await?;
    printer.await?;

    println!();
    println!("pass:        {}", response.pass);
    println!("final score: {:.1}", response.final_score);
    println!("explanation: {}", response.explanation);
    for suggestion in &response.suggestions {
        println!("suggestion:  {suggestion}");
    }

    Ok(())
}
