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

//! LLM-backed judge.
//!
//! Builds a rubric prompt from the judge's criteria and the evaluation
//! context, asks the model for a strict-JSON verdict with four rubric
//! sub-scores, and validates every score into [0, 100].

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::llm_client::LlmClient;
use crate::{Judge, JudgeError};
use tribunal_core::{
    Criticality, Dimension, EvaluationContext, JudgeResult, RetryConfig, SubScores, VerdictLabel,
};

const DEFAULT_MIN_PASSING_SCORE: f64 = 70.0;

/// Configuration for an [`LlmJudge`].
#[derive(Debug, Clone)]
pub struct LlmJudgeConfig {
    pub id: String,
    pub name: String,
    /// Free-form rubric text injected into the prompt.
    pub criteria: String,
    pub weight: f64,
    pub criticality: Criticality,
    pub dimensions: Vec<Dimension>,
    /// Used to derive the verdict label when the model omits or mangles
    /// it. Does not affect the orchestrator's final-verdict thresholds.
    pub min_passing_score: f64,
    pub retry: Option<RetryConfig>,
}

impl LlmJudgeConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            criteria: "Assess factual accuracy, absence of hallucination, query quality, \
                       and completeness of the response."
                .to_string(),
            weight: 1.0,
            criticality: Criticality::Critical,
            dimensions: vec![Dimension::Quality],
            min_passing_score: DEFAULT_MIN_PASSING_SCORE,
            retry: Some(RetryConfig::default()),
        }
    }

    pub fn with_criteria(mut self, criteria: impl Into<String>) -> Self {
        self.criteria = criteria.into();
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_criticality(mut self, criticality: Criticality) -> Self {
        self.criticality = criticality;
        self
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_min_passing_score(mut self, min_passing_score: f64) -> Self {
        self.min_passing_score = min_passing_score;
        self
    }

    pub fn with_retry(mut self, retry: Option<RetryConfig>) -> Self {
        self.retry = retry;
        self
    }
}

/// Judge that delegates scoring to an LLM.
pub struct LlmJudge {
    config: LlmJudgeConfig,
    client: Arc<dyn LlmClient>,
}

/// Verdict shape requested from the model.
#[derive(Debug, Deserialize)]
struct RawVerdict {
    factual_accuracy: f64,
    hallucination: f64,
    query_quality: f64,
    completeness: f64,
    #[serde(default)]
    overall_score: Option<f64>,
    #[serde(default)]
    verdict: Option<String>,
    #[serde(default)]
    reasoning: String,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

impl LlmJudge {
    pub fn new(config: LlmJudgeConfig, client: Arc<dyn LlmClient>) -> Self {
        Self { config, client }
    }

    fn build_prompt(&self, context: &EvaluationContext) -> String {
        let mut prompt = format!(
            r#"You are an expert evaluator judging an AI agent's response.

EVALUATION CRITERIA:
{criteria}

PROMPT (what the agent was asked):
{agent_prompt}

RESPONSE (what the agent produced):
{agent_response}
"#,
            criteria = self.config.criteria,
            agent_prompt = context.prompt,
            agent_response = context.response,
        );

        if !context.metadata.is_empty() {
            let metadata =
                serde_json::to_string(&context.metadata).unwrap_or_else(|_| "{}".to_string());
            prompt.push_str(&format!("\nEXECUTION METADATA:\n{metadata}\n"));
        }

        prompt.push_str(
            r#"
Score each dimension as an integer from 0 to 100 and respond in JSON:
{
  "factual_accuracy": <0-100>,
  "hallucination": <0-100, higher means less hallucination>,
  "query_quality": <0-100>,
  "completeness": <0-100>,
  "overall_score": <0-100>,
  "verdict": "PASS" | "FAIL" | "PARTIAL",
  "reasoning": "<brief explanation>",
  "issues": ["<issue>", ...],
  "suggestions": ["<suggestion>", ...]
}
"#,
        );

        prompt
    }

    fn parse_verdict(&self, content: &str) -> Result<RawVerdict, JudgeError> {
        let raw: RawVerdict = serde_json::from_str(content)?;

        for (field, value) in [
            ("factual_accuracy", raw.factual_accuracy),
            ("hallucination", raw.hallucination),
            ("query_quality", raw.query_quality),
            ("completeness", raw.completeness),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(JudgeError::InvalidInput(format!(
                    "{field} score {value} outside [0, 100]"
                )));
            }
        }
        if let Some(overall) = raw.overall_score {
            if !(0.0..=100.0).contains(&overall) {
                return Err(JudgeError::InvalidInput(format!(
                    "overall_score {overall} outside [0, 100]"
                )));
            }
        }

        Ok(raw)
    }

    fn verdict_label(&self, raw: &RawVerdict, overall: f64) -> VerdictLabel {
        match raw.verdict.as_deref().map(str::to_ascii_uppercase) {
            Some(label) if label == "PASS" => VerdictLabel::Pass,
            Some(label) if label == "FAIL" => VerdictLabel::Fail,
            Some(label) if label == "PARTIAL" => VerdictLabel::Partial,
            // Model omitted or mangled the label: fall back to the
            // configured passing score.
            _ => {
                if overall >= self.config.min_passing_score {
                    VerdictLabel::Pass
                } else {
                    VerdictLabel::Fail
                }
            }
        }
    }
}

#[async_trait]
impl Judge for LlmJudge {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn weight(&self) -> f64 {
        self.config.weight
    }

    fn criticality(&self) -> Criticality {
        self.config.criticality
    }

    fn dimensions(&self) -> Vec<Dimension> {
        self.config.dimensions.clone()
    }

    fn criteria(&self) -> &str {
        &self.config.criteria
    }

    fn retry_config(&self) -> Option<RetryConfig> {
        self.config.retry.clone()
    }

    async fn evaluate(&self, context: &EvaluationContext) -> Result<JudgeResult, JudgeError> {
        if context.prompt.trim().is_empty() {
            return Err(JudgeError::MissingField("prompt".to_string()));
        }
        if context.response.trim().is_empty() {
            return Err(JudgeError::MissingField("response".to_string()));
        }

        let start = Instant::now();
        let prompt = self.build_prompt(context);
        let response = self.client.complete(prompt).await?;
        let raw = self.parse_verdict(&response.content)?;

        let sub_scores = SubScores {
            factual_accuracy: raw.factual_accuracy.round() as u8,
            hallucination: raw.hallucination.round() as u8,
            query_quality: raw.query_quality.round() as u8,
            completeness: raw.completeness.round() as u8,
        };
        let overall = raw.overall_score.unwrap_or_else(|| {
            (raw.factual_accuracy + raw.hallucination + raw.query_quality + raw.completeness) / 4.0
        });
        let verdict = self.verdict_label(&raw, overall);

        let mut dimension_scores = HashMap::from([
            ("factual_accuracy".to_string(), raw.factual_accuracy),
            ("hallucination".to_string(), raw.hallucination),
            ("query_quality".to_string(), raw.query_quality),
            ("completeness".to_string(), raw.completeness),
        ]);
        for dimension in &self.config.dimensions {
            dimension_scores
                .entry(dimension.name().to_string())
                .or_insert(overall);
        }

        let (cost_in, cost_out) = self.client.cost_per_token();

        let mut result = JudgeResult::new(&self.config.id, &self.config.name);
        result.model = response.model.clone();
        result.criteria = self.config.criteria.clone();
        result.sub_scores = Some(sub_scores);
        result.score = overall;
        result.verdict = verdict;
        result.reasoning = raw.reasoning;
        result.issues = raw.issues;
        result.suggestions = raw.suggestions;
        result.dimension_scores = dimension_scores;
        result.execution_time_ms = start.elapsed().as_millis() as u64;
        result.cost_usd = response.usage.calculate_cost(cost_in, cost_out);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::{LlmError, LlmResponse, TokenUsage};

    struct CannedClient {
        content: String,
    }

    impl CannedClient {
        fn new(content: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                content: content.into(),
            })
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, _prompt: String) -> Result<LlmResponse, LlmError> {
            Ok(LlmResponse {
                content: self.content.clone(),
                usage: TokenUsage {
                    prompt_tokens: 800,
                    completion_tokens: 200,
                    total_tokens: 1000,
                },
                model: "gpt-4o-mini".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "gpt-4o-mini"
        }

        fn cost_per_token(&self) -> (f64, f64) {
            (0.00000015, 0.0000006)
        }
    }

    fn judge_with(content: &str) -> LlmJudge {
        LlmJudge::new(
            LlmJudgeConfig::new("accuracy_v1", "Accuracy"),
            CannedClient::new(content),
        )
    }

    #[tokio::test]
    async fn parses_full_verdict() {
        let judge = judge_with(
            r#"{
                "factual_accuracy": 92,
                "hallucination": 88,
                "query_quality": 85,
                "completeness": 90,
                "overall_score": 89,
                "verdict": "PASS",
                "reasoning": "Accurate and complete",
                "issues": [],
                "suggestions": ["cite sources"]
            }"#,
        );

        let ctx = EvaluationContext::new("What is the capital of France?", "Paris");
        let result = judge.evaluate(&ctx).await.unwrap();

        assert_eq!(result.judge_id, "accuracy_v1");
        assert_eq!(result.model, "gpt-4o-mini");
        assert_eq!(result.score, 89.0);
        assert_eq!(result.verdict, VerdictLabel::Pass);
        let sub = result.sub_scores.unwrap();
        assert_eq!(sub.factual_accuracy, 92);
        assert_eq!(result.dimension_scores["query_quality"], 85.0);
        // Declared dimensions map to the overall score.
        assert_eq!(result.dimension_scores["quality"], 89.0);
        assert_eq!(result.suggestions, vec!["cite sources".to_string()]);
        assert!(result.cost_usd > 0.0);
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn rejects_out_of_range_scores() {
        let judge = judge_with(
            r#"{
                "factual_accuracy": 120,
                "hallucination": 80,
                "query_quality": 80,
                "completeness": 80
            }"#,
        );

        let ctx = EvaluationContext::new("p", "r");
        let err = judge.evaluate(&ctx).await.unwrap_err();
        match err {
            JudgeError::InvalidInput(message) => assert!(message.contains("factual_accuracy")),
            other => panic!("expected invalid-input, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn derives_verdict_from_min_passing_score() {
        let judge = judge_with(
            r#"{
                "factual_accuracy": 80,
                "hallucination": 80,
                "query_quality": 80,
                "completeness": 80,
                "verdict": "MAYBE"
            }"#,
        );

        let ctx = EvaluationContext::new("p", "r");
        let result = judge.evaluate(&ctx).await.unwrap();
        // Mean of sub-scores is 80, above the default passing score.
        assert_eq!(result.score, 80.0);
        assert_eq!(result.verdict, VerdictLabel::Pass);
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let judge = judge_with("not json at all");
        let ctx = EvaluationContext::new("p", "r");
        assert!(matches!(
            judge.evaluate(&ctx).await.unwrap_err(),
            JudgeError::Json(_)
        ));
    }

    #[tokio::test]
    async fn requires_prompt_and_response() {
        let judge = judge_with("{}");
        let err = judge
            .evaluate(&EvaluationContext::new("", "r"))
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::MissingField(field) if field == "prompt"));
    }

    #[test]
    fn config_defaults_match_llm_judge_contract() {
        let config = LlmJudgeConfig::new("j", "Judge");
        assert_eq!(config.criticality, Criticality::Critical);
        assert_eq!(config.weight, 1.0);
        assert_eq!(config.dimensions, vec![Dimension::Quality]);
        assert!(config.retry.is_some());
    }
}
