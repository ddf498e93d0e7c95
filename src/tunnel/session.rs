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

//! One agent's tunnel session, from handshake to teardown.
//!
//! The first frame from the agent must be a `hello` whose identity matches
//! the connect parameters; anything else closes the connection with a
//! policy-violation code. After acceptance the session splits: a send
//! worker drains the registry outbox into the socket while the read loop
//! consumes `task_result` frames. Teardown (clean close, read error, or
//! write error alike) unregisters the agent exactly once. The registration
//! is keyed on the connection id, so a stale session can never evict a
//! reconnected successor.

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, trace, warn};

use super::frame::Frame;
use crate::broker::EventBroker;
use crate::dal::Dal;
use crate::models::AgentHello;
use crate::registry::AgentRegistry;

/// Identity the agent presented as connect parameters on the upgrade URL.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub agent_id: String,
    pub region: String,
}

/// Drives one tunnel session to completion.
pub async fn run(
    dal: Dal,
    registry: AgentRegistry,
    broker: EventBroker,
    mut socket: WebSocket,
    params: ConnectParams,
) {
    let hello = match read_hello(&mut socket).await {
        Some(hello) if hello_matches(&params, &hello) => hello,
        _ => {
            warn!(agent_id = %params.agent_id, "tunnel rejected: hello required");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "hello required".into(),
                })))
                .await;
            return;
        }
    };

    let (agent, outbox_rx) = registry.register(hello);
    let agent_id = agent.agent_id().to_string();
    let region = agent.region().to_string();
    let conn_id = agent.conn_id().to_string();
    info!(agent_id = %agent_id, region = %region, "agent connected");
    broker.publish_job_event("", "agent.connected", Some(lifecycle_payload(&agent_id, &region)));

    let (sink, stream) = socket.split();
    let send_worker = tokio::spawn(run_send_worker(outbox_rx, sink, agent_id.clone()));

    read_loop(&dal, &broker, stream, &agent_id).await;

    // Unconditional teardown. The send worker's queue dies with the
    // registration; aborting covers a worker wedged on a dead socket.
    drop(agent);
    registry.unregister(&agent_id, &conn_id);
    send_worker.abort();
    broker.publish_job_event(
        "",
        "agent.disconnected",
        Some(lifecycle_payload(&agent_id, &region)),
    );
    info!(agent_id = %agent_id, region = %region, "agent disconnected");
}

fn hello_matches(params: &ConnectParams, hello: &AgentHello) -> bool {
    hello.agent_id == params.agent_id && hello.region == params.region
}

fn lifecycle_payload(
    agent_id: &str,
    region: &str,
) -> serde_json::Map<String, serde_json::Value> {
    let mut payload = serde_json::Map::new();
    payload.insert("agentId".into(), serde_json::json!(agent_id));
    payload.insert("region".into(), serde_json::json!(region));
    payload
}

/// Reads the agent's first data frame; `Some` only for a parseable hello.
/// Ping/pong control frames are skipped, anything else is a violation.
async fn read_hello(socket: &mut WebSocket) -> Option<AgentHello> {
    loop {
        match socket.recv().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(Message::Text(text))) => {
                return match Frame::parse(&text) {
                    Ok(Frame::Hello { hello }) => Some(hello),
                    _ => None,
                };
            }
            _ => return None,
        }
    }
}

/// Drains the agent's outbound queue into the socket, one frame per write.
///
/// A lag report means the queue overflowed and its oldest frames were
/// dropped; the worker keeps going. Exits when the queue closes (the
/// registration was replaced or removed) or a write fails.
async fn run_send_worker(
    mut rx: broadcast::Receiver<Frame>,
    mut sink: SplitSink<WebSocket, Message>,
    agent_id: String,
) {
    loop {
        match rx.recv().await {
            Ok(frame) => {
                let text = match frame.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(agent_id = %agent_id, error = %e, "frame serialization failed");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!(agent_id = %agent_id, error = %e, "tunnel write failed");
                    break;
                }
            }
            Err(RecvError::Lagged(dropped)) => {
                warn!(agent_id = %agent_id, dropped, "send queue overflowed, oldest frames dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    let _ = sink.close().await;
}

/// Consumes frames from the agent until the connection ends.
async fn read_loop(
    dal: &Dal,
    broker: &EventBroker,
    mut stream: SplitStream<WebSocket>,
    agent_id: &str,
) {
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => handle_frame(dal, broker, &text, agent_id).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(agent_id = %agent_id, error = %e, "tunnel read failed");
                break;
            }
        }
    }
}

async fn handle_frame(dal: &Dal, broker: &EventBroker, text: &str, agent_id: &str) {
    match Frame::parse(text) {
        Ok(Frame::TaskResult { task_result }) => {
            match dal.tasks().set_result(&task_result).await {
                Ok((task, job)) => {
                    let mut payload = serde_json::Map::new();
                    payload.insert("taskId".into(), serde_json::json!(task.id));
                    payload.insert("success".into(), serde_json::json!(task_result.success));
                    payload.insert("job".into(), serde_json::json!(job.status));
                    broker.publish_job_event(&task.job_id, "task.finished", Some(payload));
                }
                Err(e) if e.is_not_found() => {
                    // The agent may be reporting a task whose job was purged.
                    debug!(
                        agent_id = %agent_id,
                        task_id = %task_result.task_id,
                        "result for unknown task dropped"
                    );
                }
                Err(e) => {
                    warn!(
                        agent_id = %agent_id,
                        task_id = %task_result.task_id,
                        error = %e,
                        "failed to record task result"
                    );
                }
            }
        }
        Ok(_) => trace!(agent_id = %agent_id, "ignoring non-result frame"),
        Err(e) => debug!(agent_id = %agent_id, error = %e, "ignoring unparseable frame"),
    }
}
