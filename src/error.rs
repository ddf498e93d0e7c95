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

//! Error types shared across the control plane.
//!
//! `StoreError` is the job store's taxonomy; the HTTP layer translates it
//! into status codes in one place (`api::ApiError`) so handlers never
//! hand-roll responses.

use thiserror::Error;

/// Errors produced by job store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller supplied a request the store refuses to persist.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The connection pool failed to hand out or drive a connection.
    #[error("connection pool: {0}")]
    Pool(String),

    /// A query or transaction failed inside the database.
    #[error("database: {0}")]
    Query(#[from] diesel::result::Error),

    /// A stored row could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Schema migrations failed while opening the store.
    #[error("migration: {0}")]
    Migration(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
