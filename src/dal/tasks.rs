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

//! Task operations: claiming, requeueing, lease recovery, and results.

use std::time::Duration;

use diesel::prelude::*;
use tracing::debug;

use super::jobs::recompute_job_status;
use super::models::TaskRow;
use super::Dal;
use crate::database::schema::{jobs, tasks};
use crate::database::types::now_ms;
use crate::error::StoreError;
use crate::models::{Job, JobStatus, Task, TaskResult, TaskStatus};

pub struct TaskDal<'a> {
    pub(super) dal: &'a Dal,
}

impl TaskDal<'_> {
    /// Atomically claims the oldest queued task whose region matches the
    /// requested region or is empty ("any region").
    ///
    /// On success the task moves to `Running`, its attempt increments by
    /// one, and the owning job moves to `Running` unless canceled. Returns
    /// `None` when nothing matches. The update is guarded on the task still
    /// being `Queued`, so concurrent claimers cannot double-claim.
    pub async fn claim_next_queued(&self, region: &str) -> Result<Option<Task>, StoreError> {
        let region = region.to_string();
        self.dal
            .with_conn(move |conn| {
                conn.immediate_transaction(|conn| {
                    let now = now_ms();
                    let candidate: Option<TaskRow> = tasks::table
                        .filter(tasks::status.eq(TaskStatus::Queued.as_str()))
                        .filter(tasks::region.eq(&region).or(tasks::region.eq("")))
                        .order((tasks::created_at.asc(), tasks::id.asc()))
                        .first(conn)
                        .optional()?;
                    let Some(row) = candidate else {
                        return Ok(None);
                    };

                    let updated = diesel::update(
                        tasks::table
                            .find(&row.id)
                            .filter(tasks::status.eq(TaskStatus::Queued.as_str())),
                    )
                    .set((
                        tasks::status.eq(TaskStatus::Running.as_str()),
                        tasks::attempt.eq(tasks::attempt + 1),
                        tasks::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                    if updated == 0 {
                        return Ok(None);
                    }

                    diesel::update(
                        jobs::table
                            .find(&row.job_id)
                            .filter(jobs::status.ne(JobStatus::Canceled.as_str())),
                    )
                    .set((
                        jobs::status.eq(JobStatus::Running.as_str()),
                        jobs::updated_at.eq(now),
                    ))
                    .execute(conn)?;

                    let claimed: TaskRow = tasks::table.find(&row.id).first(conn)?;
                    Ok(Some(claimed.into_domain()?))
                })
            })
            .await
    }

    /// Puts a `Running` task back in the queue without touching its attempt
    /// counter. A no-op for any other status.
    pub async fn requeue(&self, task_id: &str) -> Result<(), StoreError> {
        let task_id = task_id.to_string();
        self.dal
            .with_conn(move |conn| {
                let affected = diesel::update(
                    tasks::table
                        .find(&task_id)
                        .filter(tasks::status.eq(TaskStatus::Running.as_str())),
                )
                .set((
                    tasks::status.eq(TaskStatus::Queued.as_str()),
                    tasks::updated_at.eq(now_ms()),
                ))
                .execute(conn)?;
                if affected == 0 {
                    debug!(task_id = %task_id, "requeue skipped, task not running");
                }
                Ok(())
            })
            .await
    }

    /// Requeues every `Running` task not touched since `now - lease`.
    /// Attempt counters are preserved. Returns the number of tasks swept.
    pub async fn requeue_stale_running(&self, lease: Duration) -> Result<usize, StoreError> {
        let lease_ms = lease.as_millis() as i64;
        self.dal
            .with_conn(move |conn| {
                let now = now_ms();
                let cutoff = now - lease_ms;
                let affected = diesel::update(
                    tasks::table
                        .filter(tasks::status.eq(TaskStatus::Running.as_str()))
                        .filter(tasks::updated_at.lt(cutoff)),
                )
                .set((
                    tasks::status.eq(TaskStatus::Queued.as_str()),
                    tasks::updated_at.eq(now),
                ))
                .execute(conn)?;
                Ok(affected)
            })
            .await
    }

    /// Records an agent's result for a task and recomputes the owning job.
    ///
    /// The terminal status is applied unconditionally, whatever state the
    /// task is in: a lease-expired dispatch rediscovered in flight still
    /// lands its outcome (at-least-once contract). Fails with `NotFound`
    /// for unknown task ids.
    pub async fn set_result(&self, result: &TaskResult) -> Result<(Task, Job), StoreError> {
        let result = result.clone();
        self.dal
            .with_conn(move |conn| {
                conn.immediate_transaction(|conn| {
                    let now = now_ms();
                    let row: Option<TaskRow> =
                        tasks::table.find(&result.task_id).first(conn).optional()?;
                    let row =
                        row.ok_or_else(|| StoreError::NotFound(format!("task {}", result.task_id)))?;

                    let terminal = if result.success {
                        TaskStatus::Finished
                    } else {
                        TaskStatus::Failed
                    };
                    if let Some(err) = &result.error {
                        debug!(task_id = %row.id, error = %err, "task reported failure detail");
                    }
                    diesel::update(tasks::table.find(&row.id))
                        .set((
                            tasks::status.eq(terminal.as_str()),
                            tasks::updated_at.eq(now),
                        ))
                        .execute(conn)?;

                    let job_row = recompute_job_status(conn, &row.job_id, now)?;
                    let task_row: TaskRow = tasks::table.find(&row.id).first(conn)?;
                    Ok((task_row.into_domain()?, job_row.into_domain()?))
                })
            })
            .await
    }
}
