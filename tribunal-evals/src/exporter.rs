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

//! Downstream verdict export.
//!
//! The orchestrator submits each verdict once when export is requested;
//! failures are logged and swallowed, never surfaced to the caller.

use async_trait::async_trait;
use thiserror::Error;

use tribunal_core::{EvaluationContext, JudgeResult};

/// Ships verdicts to an external analytics backend.
#[async_trait]
pub trait VerdictExporter: Send + Sync {
    async fn export(
        &self,
        context: &EvaluationContext,
        verdict: &JudgeResult,
    ) -> Result<(), ExportError>;
}

/// Errors from verdict export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export endpoint returned status {status}: {message}")]
    Endpoint { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Exporter POSTing verdict JSON to an HTTP endpoint.
pub struct HttpExporter {
    endpoint: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl HttpExporter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[async_trait]
impl VerdictExporter for HttpExporter {
    async fn export(
        &self,
        context: &EvaluationContext,
        verdict: &JudgeResult,
    ) -> Result<(), ExportError> {
        let payload = serde_json::json!({
            "session_id": context.session_id,
            "trace_id": context.trace_id,
            "verdict": verdict,
        });

        let mut request = self.client.post(&self.endpoint).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExportError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
