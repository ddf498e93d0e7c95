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

//! Agent listing and the tunnel upgrade endpoint.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::models::AgentSnapshot;
use crate::tunnel::{self, ConnectParams};

#[derive(Debug, Serialize)]
pub struct AgentsResponse {
    pub agents: Vec<AgentSnapshot>,
}

pub async fn list_agents(State(state): State<AppState>) -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: state.registry.list(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConnectQuery {
    #[serde(default)]
    agent_id: String,
    #[serde(default)]
    region: String,
}

/// Upgrades to the agent tunnel. The declared identity must be repeated in
/// the first `hello` frame; the session enforces the match.
pub async fn agent_ws(
    State(state): State<AppState>,
    Query(query): Query<AgentConnectQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    if query.agent_id.is_empty() || query.region.is_empty() {
        return Err(ApiError::InvalidRequest(
            "agentId and region are required".into(),
        ));
    }
    let ws = ws.map_err(|_| ApiError::InvalidRequest("websocket upgrade required".into()))?;
    let params = ConnectParams {
        agent_id: query.agent_id,
        region: query.region,
    };
    Ok(ws.on_upgrade(move |socket| {
        tunnel::run(
            state.dal.clone(),
            state.registry.clone(),
            state.broker.clone(),
            socket,
            params,
        )
    }))
}
