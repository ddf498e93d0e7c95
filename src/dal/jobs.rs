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

//! Job operations: create, get, list, cancel, and status recomputation.

use std::collections::HashMap;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use tracing::debug;

use super::models::{JobRow, NewJobRow, NewTaskRow, TaskRow};
use super::Dal;
use crate::database::schema::{jobs, tasks};
use crate::database::types::{fresh_id, now_ms};
use crate::error::StoreError;
use crate::models::{Job, JobStatus, Task, TaskStatus, TaskStatusCounts};

/// Maximum page size for job listings; requests clamp into `[1, MAX]`.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Validated input for `JobDal::create`.
#[derive(Debug, Clone, Default)]
pub struct NewJobRequest {
    pub action: String,
    pub region: String,
    pub targets: Vec<String>,
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub meta: HashMap<String, String>,
}

pub struct JobDal<'a> {
    pub(super) dal: &'a Dal,
}

impl JobDal<'_> {
    /// Creates one job row and one task row per target in a single
    /// transaction. All rows are `Queued` and share the job's creation
    /// millisecond; task order preserves the input target order.
    pub async fn create(&self, req: NewJobRequest) -> Result<(Job, Vec<Task>), StoreError> {
        if req.action.trim().is_empty() {
            return Err(StoreError::InvalidArgument("action must not be empty".into()));
        }
        if req.targets.is_empty() {
            return Err(StoreError::InvalidArgument(
                "targets must not be empty".into(),
            ));
        }

        let now = now_ms();
        let job_id = fresh_id();
        let payload_json = serde_json::to_string(&req.payload)
            .map_err(|e| StoreError::InvalidArgument(format!("payload: {e}")))?;
        let targets_json = serde_json::to_string(&req.targets)
            .map_err(|e| StoreError::InvalidArgument(format!("targets: {e}")))?;
        let meta_json = serde_json::to_string(&req.meta)
            .map_err(|e| StoreError::InvalidArgument(format!("meta: {e}")))?;

        let job_row = NewJobRow {
            id: job_id.clone(),
            action: req.action.clone(),
            region: req.region.clone(),
            targets: targets_json,
            meta: meta_json,
            status: JobStatus::Queued.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };
        let task_rows: Vec<NewTaskRow> = req
            .targets
            .iter()
            .enumerate()
            .map(|(seq, target)| NewTaskRow {
                id: fresh_id(),
                job_id: job_id.clone(),
                seq: seq as i32,
                target: target.clone(),
                action: req.action.clone(),
                region: req.region.clone(),
                payload: payload_json.clone(),
                status: TaskStatus::Queued.as_str().to_string(),
                attempt: 0,
                created_at: now,
                updated_at: now,
            })
            .collect();

        let id_for_query = job_id.clone();
        self.dal
            .with_conn(move |conn| {
                conn.immediate_transaction::<_, diesel::result::Error, _>(|conn| {
                    diesel::insert_into(jobs::table)
                        .values(&job_row)
                        .execute(conn)?;
                    diesel::insert_into(tasks::table)
                        .values(&task_rows)
                        .execute(conn)?;
                    Ok(())
                })?;
                load_job_with_tasks(conn, &id_for_query)
            })
            .await
    }

    /// Returns the job and its tasks in creation order.
    pub async fn get(&self, id: &str) -> Result<(Job, Vec<Task>), StoreError> {
        let id = id.to_string();
        self.dal
            .with_conn(move |conn| load_job_with_tasks(conn, &id))
            .await
    }

    /// Lists jobs newest-first; `limit` clamps into `[1, 500]`.
    pub async fn list(&self, limit: i64) -> Result<Vec<Job>, StoreError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        self.dal
            .with_conn(move |conn| {
                let rows: Vec<JobRow> = jobs::table
                    .order((jobs::created_at.desc(), jobs::id.desc()))
                    .limit(limit)
                    .load(conn)?;
                rows.into_iter().map(JobRow::into_domain).collect()
            })
            .await
    }

    /// Cancels the job and every task of it still in `Queued` or `Running`.
    /// Tasks already terminal are left alone. Idempotent; cancellation is
    /// sticky at job level.
    pub async fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let id = id.to_string();
        self.dal
            .with_conn(move |conn| {
                conn.immediate_transaction(|conn| {
                    let now = now_ms();
                    let existing: Option<JobRow> =
                        jobs::table.find(&id).first(conn).optional()?;
                    if existing.is_none() {
                        return Err(StoreError::NotFound(format!("job {id}")));
                    }
                    diesel::update(jobs::table.find(&id))
                        .set((
                            jobs::status.eq(JobStatus::Canceled.as_str()),
                            jobs::updated_at.eq(now),
                        ))
                        .execute(conn)?;
                    let affected = diesel::update(
                        tasks::table.filter(tasks::job_id.eq(&id)).filter(
                            tasks::status.eq_any([
                                TaskStatus::Queued.as_str(),
                                TaskStatus::Running.as_str(),
                            ]),
                        ),
                    )
                    .set((
                        tasks::status.eq(TaskStatus::Canceled.as_str()),
                        tasks::updated_at.eq(now),
                    ))
                    .execute(conn)?;
                    debug!(job_id = %id, tasks = affected, "job canceled");
                    Ok(())
                })
            })
            .await
    }
}

/// Loads a job and its tasks (input order) on the current connection.
fn load_job_with_tasks(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<(Job, Vec<Task>), StoreError> {
    let row: Option<JobRow> = jobs::table.find(id).first(conn).optional()?;
    let row = row.ok_or_else(|| StoreError::NotFound(format!("job {id}")))?;
    let task_rows: Vec<TaskRow> = tasks::table
        .filter(tasks::job_id.eq(id))
        .order(tasks::seq.asc())
        .load(conn)?;
    let job = row.into_domain()?;
    let tasks = task_rows
        .into_iter()
        .map(TaskRow::into_domain)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((job, tasks))
}

/// Recomputes the owning job's status from its tasks and persists the
/// change when it differs. Canceled jobs are never touched (sticky).
///
/// Must run inside the caller's transaction so the tally and the update
/// observe the same task states.
pub(super) fn recompute_job_status(
    conn: &mut SqliteConnection,
    job_id: &str,
    now: i64,
) -> Result<JobRow, StoreError> {
    let job: JobRow = jobs::table.find(job_id).first(conn)?;
    if job.status == JobStatus::Canceled.as_str() {
        return Ok(job);
    }

    let statuses: Vec<String> = tasks::table
        .filter(tasks::job_id.eq(job_id))
        .select(tasks::status)
        .load(conn)?;
    let parsed = statuses
        .iter()
        .map(|s| s.parse::<TaskStatus>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::Corrupt)?;
    let next = JobStatus::from_task_counts(&TaskStatusCounts::tally(parsed));

    if next.as_str() == job.status {
        return Ok(job);
    }
    diesel::update(jobs::table.find(job_id))
        .set((jobs::status.eq(next.as_str()), jobs::updated_at.eq(now)))
        .execute(conn)?;
    Ok(jobs::table.find(job_id).first(conn)?)
}
