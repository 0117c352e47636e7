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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input to a single evaluation: the agent exchange under judgment plus
/// observed execution metadata. Treated as immutable once handed to a
/// judge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationContext {
    /// Prompt the agent was asked to handle.
    pub prompt: String,

    /// The agent's response text.
    pub response: String,

    /// Pattern/tool metadata captured from the agent run.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Observed cost of the agent run in USD.
    pub cost_usd: f64,

    /// Observed latency of the agent run in milliseconds.
    pub latency_ms: u64,

    /// Session this exchange belongs to.
    pub session_id: String,

    /// Trace identity for correlating with observability backends.
    pub trace_id: String,
}

impl EvaluationContext {
    /// Create a context with fresh session/trace identities.
    pub fn new(prompt: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            response: response.into(),
            metadata: HashMap::new(),
            cost_usd: 0.0,
            latency_ms: 0,
            session_id: uuid::Uuid::new_v4().to_string(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Attach a metadata entry (tool calls, matched patterns, model id).
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Record the observed cost of the agent run. Negative values clamp to 0.
    pub fn with_cost_usd(mut self, cost_usd: f64) -> Self {
        self.cost_usd = cost_usd.max(0.0);
        self
    }

    /// Record the observed latency of the agent run.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }
}
