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

//! Job model and job status recomputation.
//!
//! A job's status is a pure function of the multiset of its tasks' statuses
//! unless the job was explicitly canceled; cancellation is sticky and the
//! caller short-circuits recomputation for canceled jobs.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskStatus;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "Queued",
            JobStatus::Running => "Running",
            JobStatus::Finished => "Finished",
            JobStatus::Failed => "Failed",
            JobStatus::Canceled => "Canceled",
        }
    }

    /// Derives the job status from its tasks' status counts.
    ///
    /// The first matching rule wins:
    /// 1. any task running -> `Running`
    /// 2. queued tasks plus any terminal task -> `Running` (in progress)
    /// 3. queued tasks only -> `Queued`
    /// 4. any failure -> `Failed`
    /// 5. cancellations but no terminal results -> `Canceled`
    /// 6. otherwise -> `Finished`
    ///
    /// Sticky cancellation (a canceled job never leaves `Canceled`) is
    /// enforced by the caller before consulting this function.
    pub fn from_task_counts(c: &TaskStatusCounts) -> JobStatus {
        if c.running > 0 {
            JobStatus::Running
        } else if c.queued > 0 && (c.finished > 0 || c.failed > 0 || c.canceled > 0) {
            JobStatus::Running
        } else if c.queued > 0 {
            JobStatus::Queued
        } else if c.failed > 0 {
            JobStatus::Failed
        } else if c.canceled > 0 && c.finished == 0 && c.failed == 0 {
            JobStatus::Canceled
        } else {
            JobStatus::Finished
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Queued" => Ok(JobStatus::Queued),
            "Running" => Ok(JobStatus::Running),
            "Finished" => Ok(JobStatus::Finished),
            "Failed" => Ok(JobStatus::Failed),
            "Canceled" => Ok(JobStatus::Canceled),
            other => Err(format!("unknown job status {other:?}")),
        }
    }
}

/// Per-status task tally used by the recomputation rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStatusCounts {
    pub queued: usize,
    pub running: usize,
    pub finished: usize,
    pub failed: usize,
    pub canceled: usize,
}

impl TaskStatusCounts {
    pub fn tally<I: IntoIterator<Item = TaskStatus>>(statuses: I) -> Self {
        let mut counts = TaskStatusCounts::default();
        for status in statuses {
            match status {
                TaskStatus::Queued => counts.queued += 1,
                TaskStatus::Running => counts.running += 1,
                TaskStatus::Finished => counts.finished += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Canceled => counts.canceled += 1,
            }
        }
        counts
    }
}

/// A batch of related tasks submitted as one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub action: String,
    pub region: String,
    pub targets: Vec<String>,
    pub meta: HashMap<String, String>,
    pub status: JobStatus,
    #[serde(with = "crate::database::types::iso_millis")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::database::types::iso_millis")]
    pub updated_at: DateTime<Utc>,
}
