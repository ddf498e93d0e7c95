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

//! Row structs mapping the `jobs` and `tasks` tables, plus their
//! conversions to domain types. Rows keep database-native representations
//! (hex-string ids, int64 milliseconds, JSON text columns).

use diesel::prelude::*;

use crate::database::types::ms_to_datetime;
use crate::error::StoreError;
use crate::models::{Job, Task};

/// A job as stored.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::database::schema::jobs)]
pub struct JobRow {
    pub id: String,
    pub action: String,
    pub region: String,
    pub targets: String,
    pub meta: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A job to be inserted.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::jobs)]
pub struct NewJobRow {
    pub id: String,
    pub action: String,
    pub region: String,
    pub targets: String,
    pub meta: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task as stored.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::database::schema::tasks)]
pub struct TaskRow {
    pub id: String,
    pub job_id: String,
    pub seq: i32,
    pub target: String,
    pub action: String,
    pub region: String,
    pub payload: String,
    pub status: String,
    pub attempt: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task to be inserted.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::tasks)]
pub struct NewTaskRow {
    pub id: String,
    pub job_id: String,
    pub seq: i32,
    pub target: String,
    pub action: String,
    pub region: String,
    pub payload: String,
    pub status: String,
    pub attempt: i32,
    pub created_at: i64,
    pub updated_at: i64,
}

impl JobRow {
    pub fn into_domain(self) -> Result<Job, StoreError> {
        let status = self.status.parse().map_err(StoreError::Corrupt)?;
        let targets = serde_json::from_str(&self.targets)
            .map_err(|e| StoreError::Corrupt(format!("job {} targets: {e}", self.id)))?;
        let meta = serde_json::from_str(&self.meta)
            .map_err(|e| StoreError::Corrupt(format!("job {} meta: {e}", self.id)))?;
        Ok(Job {
            id: self.id,
            action: self.action,
            region: self.region,
            targets,
            meta,
            status,
            created_at: ms_to_datetime(self.created_at),
            updated_at: ms_to_datetime(self.updated_at),
        })
    }
}

impl TaskRow {
    pub fn into_domain(self) -> Result<Task, StoreError> {
        let status = self.status.parse().map_err(StoreError::Corrupt)?;
        let payload = serde_json::from_str(&self.payload)
            .map_err(|e| StoreError::Corrupt(format!("task {} payload: {e}", self.id)))?;
        Ok(Task {
            id: self.id,
            job_id: self.job_id,
            target: self.target,
            action: self.action,
            region: self.region,
            payload,
            status,
            attempt: self.attempt,
            created_at: ms_to_datetime(self.created_at),
            updated_at: ms_to_datetime(self.updated_at),
        })
    }
}
