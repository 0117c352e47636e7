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

//! Verdict contracts: a single judge's scored opinion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Textual verdict label attached to a [`JudgeResult`] and to the final
/// aggregated outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictLabel {
    Pass,
    Fail,
    Partial,
}

impl VerdictLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerdictLabel::Pass => "PASS",
            VerdictLabel::Fail => "FAIL",
            VerdictLabel::Partial => "PARTIAL",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, VerdictLabel::Pass)
    }
}

impl fmt::Display for VerdictLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four rubric sub-scores an LLM-backed judge reports, each in
/// [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub factual_accuracy: u8,
    pub hallucination: u8,
    pub query_quality: u8,
    pub completeness: u8,
}

impl SubScores {
    pub const MAX_SCORE: u8 = 100;

    /// All four sub-scores within [0, 100].
    pub fn in_range(&self) -> bool {
        self.factual_accuracy <= Self::MAX_SCORE
            && self.hallucination <= Self::MAX_SCORE
            && self.query_quality <= Self::MAX_SCORE
            && self.completeness <= Self::MAX_SCORE
    }
}

/// A single judge's scored opinion about one evaluation context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeResult {
    /// Identity of the judge that produced this verdict.
    pub judge_id: String,

    /// Human-readable judge name.
    pub judge_name: String,

    /// Model the judge consulted, for provenance.
    #[serde(default)]
    pub model: String,

    /// Criteria text actually applied.
    #[serde(default)]
    pub criteria: String,

    /// Rubric sub-scores; present for LLM-backed judges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_scores: Option<SubScores>,

    /// Overall score in [0, 100].
    pub score: f64,

    /// Verdict label. Forced to FAIL whenever `error` is set.
    pub verdict: VerdictLabel,

    /// Free-form reasoning behind the verdict.
    #[serde(default)]
    pub reasoning: String,

    /// Issues the judge flagged in the response.
    #[serde(default)]
    pub issues: Vec<String>,

    /// Suggested improvements.
    #[serde(default)]
    pub suggestions: Vec<String>,

    /// Score per scored dimension, keyed by dimension name.
    #[serde(default)]
    pub dimension_scores: HashMap<String, f64>,

    /// Wallclock spent evaluating, in milliseconds.
    pub execution_time_ms: u64,

    /// Cost incurred by the judge itself, in USD.
    pub cost_usd: f64,

    /// When the verdict was produced.
    pub timestamp: DateTime<Utc>,

    /// Error string when the judge could not evaluate cleanly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JudgeResult {
    /// A blank verdict for the given judge, timestamped now.
    pub fn new(judge_id: impl Into<String>, judge_name: impl Into<String>) -> Self {
        Self {
            judge_id: judge_id.into(),
            judge_name: judge_name.into(),
            model: String::new(),
            criteria: String::new(),
            sub_scores: None,
            score: 0.0,
            verdict: VerdictLabel::Fail,
            reasoning: String::new(),
            issues: Vec::new(),
            suggestions: Vec::new(),
            dimension_scores: HashMap::new(),
            execution_time_ms: 0,
            cost_usd: 0.0,
            timestamp: Utc::now(),
            error: None,
        }
    }

    /// An errored verdict. The label is forced to FAIL: a nonempty error
    /// and a passing verdict never coexist.
    pub fn from_error(
        judge_id: impl Into<String>,
        judge_name: impl Into<String>,
        error: impl fmt::Display,
    ) -> Self {
        let mut result = Self::new(judge_id, judge_name);
        result.verdict = VerdictLabel::Fail;
        result.error = Some(error.to_string());
        result
    }

    /// Record an error on an existing verdict, downgrading the label.
    pub fn set_error(&mut self, error: impl fmt::Display) {
        self.error = Some(error.to_string());
        self.verdict = VerdictLabel::Fail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_labels_serialize_uppercase() {
        assert_eq!(
            serde_json::to_string(&VerdictLabel::Pass).unwrap(),
            "\"PASS\""
        );
        assert_eq!(
            serde_json::to_string(&VerdictLabel::Partial).unwrap(),
            "\"PARTIAL\""
        );
    }

    #[test]
    fn error_forces_fail() {
        let result = JudgeResult::from_error("j1", "Judge 1", "upstream 503");
        assert_eq!(result.verdict, VerdictLabel::Fail);
        assert_eq!(result.error.as_deref(), Some("upstream 503"));

        let mut passing = JudgeResult::new("j2", "Judge 2");
        passing.verdict = VerdictLabel::Pass;
        passing.set_error("late failure");
        assert_eq!(passing.verdict, VerdictLabel::Fail);
    }

    #[test]
    fn sub_scores_range_check() {
        let ok = SubScores {
            factual_accuracy: 100,
            hallucination: 0,
            query_quality: 55,
            completeness: 70,
        };
        assert!(ok.in_range());

        let out = SubScores {
            factual_accuracy: 120,
            ..Default::default()
        };
        assert!(!out.in_range());
    }
}
