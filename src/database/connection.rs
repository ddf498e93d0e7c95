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

//! SQLite connection management for the job store.
//!
//! The store deliberately runs on a pool of size one: every read and write
//! serializes on the single pooled connection, which is the single-writer
//! discipline the compound operations in the DAL rely on. Compound writes
//! additionally run inside `immediate_transaction` so they commit fully or
//! not at all.
//!
//! Accepts a file path or `:memory:` for an ephemeral store. Migrations run
//! on open and are idempotent.

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::prelude::*;
use diesel_migrations::MigrationHarness;
use tracing::info;

use crate::error::StoreError;

/// Pooled connection object handed to DAL closures.
pub type PooledConnection = deadpool_diesel::sqlite::Object;

/// A handle to the embedded SQLite database.
///
/// `Database` is `Clone`; each clone references the same underlying pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Database(sqlite)")
    }
}

impl Database {
    /// Opens (creating if necessary) the database at `path` and runs
    /// pending migrations.
    ///
    /// `path` may be a filesystem path, a `sqlite://` URL, or `:memory:`.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = Self::normalize_url(path);
        let manager = Manager::new(url.clone(), Runtime::Tokio1);
        // Pool size 1: the single-writer discipline. See module docs.
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| StoreError::Pool(e.to_string()))?;

        let db = Self { pool };
        db.run_migrations().await?;
        info!(path = %url, "job store opened");
        Ok(db)
    }

    /// Gets the pooled connection, waiting if another operation holds it.
    pub async fn conn(&self) -> Result<PooledConnection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(e.to_string()))
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let conn = self.conn().await?;
        conn.interact(|conn| {
            diesel::sql_query("PRAGMA foreign_keys = ON").execute(conn)?;
            conn.run_pending_migrations(super::MIGRATIONS)
                .map(|_| ())
                .map_err(|e| StoreError::Migration(e.to_string()))?;
            Ok::<_, StoreError>(())
        })
        .await
        .map_err(|e| StoreError::Pool(e.to_string()))??;
        Ok(())
    }

    fn normalize_url(path: &str) -> String {
        // Strip the sqlite:// prefix if present; deadpool-diesel expects a
        // bare path or :memory:.
        match path.strip_prefix("sqlite://") {
            Some(stripped) => stripped.to_string(),
            None => path.to_string(),
        }
    }
}
