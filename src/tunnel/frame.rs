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

//! The tunnel's wire protocol: one JSON object per WebSocket text frame.
//!
//! The parser is strict: an unknown `type` string is a parse error, not a
//! silently-dropped frame. Tolerance for frames the control plane does not
//! consume lives in the session's dispatch loop, not here.

use serde::{Deserialize, Serialize};

use crate::models::{AgentHello, Task, TaskResult};

/// A single protocol frame.
///
/// Only `hello` is accepted as an agent's first frame. Only `task` is ever
/// sent to an agent. Only `task_result` is consumed from an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Hello { hello: AgentHello },
    Task { task: Task },
    TaskResult {
        #[serde(rename = "taskResult")]
        task_result: TaskResult,
    },
}

impl Frame {
    /// Parses one frame from a text payload.
    pub fn parse(text: &str) -> Result<Frame, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serializes the frame for transmission.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
