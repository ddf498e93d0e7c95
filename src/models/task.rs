/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Task model: the dispatch atom. One task per target within a job.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// `Queued -> Running` only through a claim; `Running -> Queued` through a
/// requeue (dispatch failure or lease expiry, attempt unchanged); terminal
/// states through a result (`Finished`/`Failed`) or job cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "Queued",
            TaskStatus::Running => "Running",
            TaskStatus::Finished => "Finished",
            TaskStatus::Failed => "Failed",
            TaskStatus::Canceled => "Canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(TaskStatus::Queued),
            "Running" => Ok(TaskStatus::Running),
            "Finished" => Ok(TaskStatus::Finished),
            "Failed" => Ok(TaskStatus::Failed),
            "Canceled" => Ok(TaskStatus::Canceled),
            other => Err(format!("unknown task status {other:?}")),
        }
    }
}

/// A single unit of work for one target.
///
/// This is also the wire shape delivered to agents inside a `task` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub job_id: String,
    pub target: String,
    pub action: String,
    pub region: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub status: TaskStatus,
    pub attempt: i32,
    #[serde(with = "crate::database::types::iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::database::types::iso_millis")]
    pub updated_at: DateTime<Utc>,
}

/// An agent's report for a dispatched task.
///
/// `finished_at` is the agent's clock and does not participate in status
/// derivation; `error` and `output` are logged but not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(with = "crate::database::types::iso_millis")]
    pub finished_at: DateTime<Utc>,
}
