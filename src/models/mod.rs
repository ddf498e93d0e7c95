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

//! Domain models: jobs, tasks, agents, and broker events.
//!
//! These are the types that cross the API boundary. JSON field names are
//! lowerCamelCase; timestamps serialize as ISO-8601 UTC with millisecond
//! precision.

pub mod agent;
pub mod event;
pub mod job;
pub mod task;

pub use agent::{AgentHello, AgentSnapshot};
pub use event::{AuthChallengeEvent, JobEvent, SessionEvent};
pub use job::{Job, JobStatus, TaskStatusCounts};
pub use task::{Task, TaskResult, TaskStatus};
