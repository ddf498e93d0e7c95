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

//! Data access layer for the job store.
//!
//! All compound operations run inside `immediate_transaction` on the single
//! pooled connection, which acquires SQLite's write lock up front and makes
//! each operation atomic with respect to every other. State changes either
//! commit fully or not at all.

pub mod models;

mod jobs;
mod tasks;

pub use jobs::{JobDal, NewJobRequest};
pub use tasks::TaskDal;

use diesel::sqlite::SqliteConnection;

use crate::database::Database;
use crate::error::StoreError;

/// Facade over the job store's operations.
///
/// `Dal` is `Clone`; clones share the same database handle.
#[derive(Clone, Debug)]
pub struct Dal {
    database: Database,
}

impl Dal {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Job-scoped operations.
    pub fn jobs(&self) -> JobDal<'_> {
        JobDal { dal: self }
    }

    /// Task-scoped operations.
    pub fn tasks(&self) -> TaskDal<'_> {
        TaskDal { dal: self }
    }

    /// Runs `f` on the pooled connection's blocking thread.
    pub(crate) async fn with_conn<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        R: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<R, StoreError> + Send + 'static,
    {
        let conn = self.database.conn().await?;
        conn.interact(f)
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))?
    }
}
