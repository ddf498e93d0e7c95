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

//! Broker event types.
//!
//! Events are ephemeral: never persisted, never replayed, delivered
//! at-most-once to subscribers connected at publish time. Each carries an
//! independently generated 32-hex random id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::types::{fresh_id, iso_millis};

/// Progress event scoped to one job id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEvent {
    pub id: String,
    pub job_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(with = "iso_millis")]
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Map<String, serde_json::Value>>,
}

impl JobEvent {
    pub fn new(
        job_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Self {
        Self {
            id: fresh_id(),
            job_id: job_id.into(),
            event_type: event_type.into(),
            ts: Utc::now(),
            payload,
        }
    }
}

/// Session lifecycle event scoped to one account name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub id: String,
    pub account_name: String,
    pub event_type: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(with = "iso_millis")]
    pub ts: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(
        account_name: impl Into<String>,
        event_type: impl Into<String>,
        state: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            id: fresh_id(),
            account_name: account_name.into(),
            event_type: event_type.into(),
            state: state.into(),
            message,
            ts: Utc::now(),
        }
    }
}

/// Interactive authentication challenge scoped to one account name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallengeEvent {
    pub id: String,
    pub account_name: String,
    pub challenge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(with = "iso_millis")]
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl AuthChallengeEvent {
    pub fn new(
        account_name: impl Into<String>,
        challenge_type: impl Into<String>,
        message: Option<String>,
        job_id: Option<String>,
    ) -> Self {
        Self {
            id: fresh_id(),
            account_name: account_name.into(),
            challenge_type: challenge_type.into(),
            message,
            ts: Utc::now(),
            job_id,
        }
    }
}
