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

//! bosun: control plane for fleet automation jobs.
//!
//! Tenants submit jobs over HTTP; the control plane fans each job into
//! per-target tasks, dispatches them to regional agents over persistent
//! WebSocket tunnels, and streams progress and interactive auth challenges
//! back over server-sent events.
//!
//! # Architecture
//!
//! - [`dal`]: the persistent job store with transactional create/claim/
//!   requeue/finalize primitives over embedded SQLite, plus job status
//!   recomputation with sticky cancellation.
//! - [`broker`]: in-process event fan-out across three topic spaces with
//!   bounded drop-oldest subscriber buffers.
//! - [`registry`]: connected agents, their bounded send queues, and
//!   region-scoped selection.
//! - [`tunnel`]: the framed duplex session per agent, from handshake and
//!   ingestion, outbound delivery, teardown.
//! - [`dispatcher`]: the periodic loop tying them together with lease sweeps,
//!   FIFO claims per region, at-least-once hand-off to agents.
//! - [`api`]: the HTTP surface (submission, inspection, cancellation, SSE
//!   streams, agent upgrade).
//!
//! Delivery is at-least-once end to end; agents must treat tasks
//! idempotently by task id.

pub mod api;
pub mod broker;
pub mod config;
pub mod dal;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod registry;
pub mod tunnel;

pub use broker::EventBroker;
pub use config::Config;
pub use dal::Dal;
pub use database::Database;
pub use dispatcher::Dispatcher;
pub use registry::AgentRegistry;
