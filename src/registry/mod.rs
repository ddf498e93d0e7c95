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

//! In-memory registry of connected agents.
//!
//! Each entry owns the agent's declared identity and a bounded outbound
//! queue (capacity 1024) of protocol frames. The queue drops its **oldest**
//! entries under pressure (the newest dispatch is the most relevant) and
//! enqueueing fails only when the draining worker is gone.
//!
//! A reconnect under the same agent id replaces the prior entry; the
//! replaced entry's queue closes once drained. Unregistration is keyed on
//! (agent id, connection id) so a stale connection's teardown can never
//! evict its successor.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::database::types::fresh_id;
use crate::models::{AgentHello, AgentSnapshot, Task};
use crate::tunnel::Frame;

/// Outbound frames buffered per agent before the send worker drains them.
const SEND_QUEUE_CAPACITY: usize = 1024;

/// A currently connected agent.
#[derive(Clone)]
pub struct ConnectedAgent {
    hello: AgentHello,
    connected_at: DateTime<Utc>,
    conn_id: String,
    outbox: broadcast::Sender<Frame>,
}

impl ConnectedAgent {
    pub fn agent_id(&self) -> &str {
        &self.hello.agent_id
    }

    pub fn region(&self) -> &str {
        &self.hello.region
    }

    /// Identifies this particular connection across reconnects.
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.hello.agent_id.clone(),
            region: self.hello.region.clone(),
            capabilities: self.hello.capabilities.clone(),
            meta: self.hello.meta.clone(),
            connected_at: self.connected_at,
        }
    }
}

/// Registry of connected agents. `Clone` shares the underlying map.
#[derive(Clone)]
pub struct AgentRegistry {
    agents: Arc<DashMap<String, ConnectedAgent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(DashMap::new()),
        }
    }

    /// Inserts the agent, replacing any prior entry under the same id, and
    /// returns the entry together with the outbound queue's receiving end.
    /// The caller spawns the worker that drains the receiver into the
    /// transport.
    pub fn register(&self, hello: AgentHello) -> (ConnectedAgent, broadcast::Receiver<Frame>) {
        let (outbox, rx) = broadcast::channel(SEND_QUEUE_CAPACITY);
        let agent = ConnectedAgent {
            hello,
            connected_at: Utc::now(),
            conn_id: fresh_id(),
            outbox,
        };
        let replaced = self
            .agents
            .insert(agent.agent_id().to_string(), agent.clone());
        if replaced.is_some() {
            info!(agent_id = %agent.agent_id(), "agent reconnected, replacing prior registration");
        }
        (agent, rx)
    }

    /// Removes the agent's entry if it still belongs to the given
    /// connection. Harmless to call twice, and a no-op when a newer
    /// connection has already taken the id.
    pub fn unregister(&self, agent_id: &str, conn_id: &str) -> bool {
        self.agents
            .remove_if(agent_id, |_, agent| agent.conn_id == conn_id)
            .is_some()
    }

    /// Snapshots of the current entries, sorted by region then agent id.
    pub fn list(&self) -> Vec<AgentSnapshot> {
        let mut snapshots: Vec<AgentSnapshot> = self
            .agents
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| {
            a.region
                .cmp(&b.region)
                .then_with(|| a.agent_id.cmp(&b.agent_id))
        });
        snapshots
    }

    /// The distinct, sorted set of regions currently connected.
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self
            .agents
            .iter()
            .map(|entry| entry.value().hello.region.clone())
            .collect();
        regions.sort();
        regions.dedup();
        regions
    }

    /// Some currently-connected agent in the region, or `None`.
    ///
    /// Currently the one with the smallest agent id, a deterministic
    /// placeholder the interface deliberately keeps swappable.
    pub fn pick(&self, region: &str) -> Option<ConnectedAgent> {
        self.agents
            .iter()
            .filter(|entry| entry.value().hello.region == region)
            .min_by(|a, b| a.value().hello.agent_id.cmp(&b.value().hello.agent_id))
            .map(|entry| entry.value().clone())
    }

    /// Enqueues a task-delivery frame on the agent's outbound queue.
    ///
    /// Under pressure the queue drops its oldest frames, so this returns
    /// `false` only when the send worker is no longer draining.
    pub fn enqueue_task(&self, agent: &ConnectedAgent, task: Task) -> bool {
        let accepted = agent.outbox.send(Frame::Task { task }).is_ok();
        if !accepted {
            debug!(agent_id = %agent.agent_id(), "enqueue failed, send worker gone");
        }
        accepted
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
