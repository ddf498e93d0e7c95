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

//! Environment-driven configuration.
//!
//! Recognized keys: `ADMIN_API_KEY` (required), `AGENT_API_KEYS`
//! (comma-separated), `DB_PATH`, `TASK_LEASE_SECONDS`, `ENABLE_SWAGGER`,
//! `LISTEN_ADDR`. A missing or malformed required value is a fatal startup
//! error.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_DB_PATH: &str = "data/controlplane.db";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TASK_LEASE_SECONDS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// The single token accepted in the admin scope.
    pub admin_api_key: String,
    /// Tokens accepted in the agent scope.
    pub agent_api_keys: Vec<String>,
    /// Store location; `:memory:` means ephemeral.
    pub db_path: String,
    /// Running tasks untouched for this long are requeued.
    pub task_lease: Duration,
    /// Mount the OpenAPI document.
    pub enable_swagger: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let admin_api_key =
            read("ADMIN_API_KEY").ok_or(ConfigError::Missing("ADMIN_API_KEY"))?;

        let agent_api_keys = read("AGENT_API_KEYS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|key| !key.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let db_path = read("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let task_lease = match read("TASK_LEASE_SECONDS") {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::Invalid {
                    key: "TASK_LEASE_SECONDS",
                    value: raw,
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TASK_LEASE_SECONDS),
        };

        let enable_swagger = read("ENABLE_SWAGGER")
            .map(|raw| truthy(&raw))
            .unwrap_or(false);

        let listen_raw = read("LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "LISTEN_ADDR",
            value: listen_raw,
        })?;

        Ok(Self {
            listen_addr,
            admin_api_key,
            agent_api_keys,
            db_path,
            task_lease,
            enable_swagger,
        })
    }
}

fn read(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn truthy(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}
