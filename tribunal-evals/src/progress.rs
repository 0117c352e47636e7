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

//! Streaming progress protocol.
//!
//! The orchestrator emits one `JudgeStarted`/`JudgeCompleted` pair per
//! judge and a single trailing `EvaluationCompleted`. Every send is a
//! non-blocking attempt: a full or closed sink drops the update rather
//! than stalling fan-out. The sink is owned and closed by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::orchestrator::EvaluateResponse;
use tribunal_core::JudgeResult;

/// A single streamed progress event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressUpdate {
    /// Emitted on the evaluating task's own stack before the judge is
    /// invoked, so it always precedes the matching `JudgeCompleted`.
    JudgeStarted {
        judge_id: String,
        example_number: u32,
        started_at: DateTime<Utc>,
    },
    /// Emitted after the judge returns a verdict.
    JudgeCompleted {
        judge_id: String,
        example_number: u32,
        result: JudgeResult,
        duration_ms: u64,
    },
    /// Emitted once, after aggregation and export.
    EvaluationCompleted {
        final_result: Box<EvaluateResponse>,
        total_duration_ms: u64,
    },
}

/// Caller-supplied channel receiving [`ProgressUpdate`]s.
pub type ProgressSink = mpsc::Sender<ProgressUpdate>;

/// Best-effort send: drops the update when the sink is full or closed.
pub(crate) fn try_emit(sink: Option<&ProgressSink>, update: ProgressUpdate) {
    if let Some(sink) = sink {
        if let Err(err) = sink.try_send(update) {
            debug!("dropped progress update: {}", err);
        }
    }
}
