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

//! The dispatch loop: claims queued tasks and hands them to agents.
//!
//! Every tick sweeps expired leases, then walks the connected regions in
//! sorted order, claiming FIFO per region up to a per-tick cap. Per-task
//! failures (agent raced away, queue gone) requeue the task, publish a
//! diagnostic event, and move on; the loop never exits except on shutdown.
//!
//! Delivery is at-least-once: a crash between claim and enqueue, or between
//! enqueue and transmission, leaves a `Running` task the next lease sweep
//! reclaims. Agents must treat tasks idempotently by task id.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::broker::EventBroker;
use crate::dal::Dal;
use crate::registry::AgentRegistry;

/// Fixed cadence of the dispatch loop.
const TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Cap on claims per region per tick; bounds the tail latency one busy
/// region can impose on the others.
const MAX_TASKS_PER_REGION_TICK: usize = 25;

pub struct Dispatcher {
    dal: Dal,
    registry: AgentRegistry,
    broker: EventBroker,
    lease: Duration,
}

impl Dispatcher {
    pub fn new(dal: Dal, registry: AgentRegistry, broker: EventBroker, lease: Duration) -> Self {
        Self {
            dal,
            registry,
            broker,
            lease,
        }
    }

    /// Runs until the shutdown signal fires.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(lease_secs = self.lease.as_secs(), "dispatcher started");
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick().await,
                _ = shutdown.changed() => {
                    info!("dispatcher stopped");
                    return;
                }
            }
        }
    }

    /// One dispatch pass: lease sweep, then per-region claim/enqueue.
    pub async fn tick(&self) {
        match self.dal.tasks().requeue_stale_running(self.lease).await {
            Ok(0) => {}
            Ok(swept) => warn!(count = swept, "requeued stale running tasks"),
            Err(e) => error!(error = %e, "lease sweep failed"),
        }

        for region in self.registry.regions() {
            self.dispatch_region(&region).await;
        }
    }

    async fn dispatch_region(&self, region: &str) {
        for _ in 0..MAX_TASKS_PER_REGION_TICK {
            let task = match self.dal.tasks().claim_next_queued(region).await {
                Ok(Some(task)) => task,
                Ok(None) => return,
                Err(e) => {
                    error!(region = %region, error = %e, "claim failed");
                    return;
                }
            };

            let Some(agent) = self.registry.pick(region) else {
                // Raced with a disconnect; put the task back for the next tick.
                self.requeue(&task.id).await;
                self.publish_task_event(
                    &task.job_id,
                    "task.dispatch_failed",
                    &task.id,
                    [("error", serde_json::json!("no agent available"))],
                );
                return;
            };

            if !self.registry.enqueue_task(&agent, task.clone()) {
                self.requeue(&task.id).await;
                self.publish_task_event(
                    &task.job_id,
                    "task.enqueue_failed",
                    &task.id,
                    [("agentId", serde_json::json!(agent.agent_id()))],
                );
                return;
            }

            debug!(task_id = %task.id, agent_id = %agent.agent_id(), "task dispatched");
            self.publish_task_event(
                &task.job_id,
                "task.dispatched",
                &task.id,
                [("agentId", serde_json::json!(agent.agent_id()))],
            );
        }
    }

    async fn requeue(&self, task_id: &str) {
        if let Err(e) = self.dal.tasks().requeue(task_id).await {
            error!(task_id = %task_id, error = %e, "requeue failed");
        }
    }

    fn publish_task_event<const N: usize>(
        &self,
        job_id: &str,
        event_type: &str,
        task_id: &str,
        extra: [(&str, serde_json::Value); N],
    ) {
        let mut payload = serde_json::Map::new();
        payload.insert("taskId".into(), serde_json::json!(task_id));
        for (key, value) in extra {
            payload.insert(key.into(), value);
        }
        self.broker.publish_job_event(job_id, event_type, Some(payload));
    }
}
