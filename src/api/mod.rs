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

//! HTTP surface of the control plane.
//!
//! Routes are grouped by bearer scope and each group carries its auth
//! middleware as a route layer, so handler code never checks tokens.
//! Domain errors translate to status codes in exactly one place
//! ([`ApiError`]); response bodies never carry stack traces.

mod agents;
mod auth;
mod jobs;
mod openapi;
mod streams;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::broker::EventBroker;
use crate::config::Config;
use crate::dal::Dal;
use crate::error::StoreError;
use crate::registry::AgentRegistry;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub dal: Dal,
    pub broker: EventBroker,
    pub registry: AgentRegistry,
    pub config: Arc<Config>,
}

/// Builds the full router with auth layers applied per scope.
pub fn router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/v1/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/v1/jobs/{id}", get(jobs::get_job))
        .route("/v1/jobs/{id}/cancel", post(jobs::cancel_job))
        .route("/v1/jobs/{id}/events", get(streams::job_events))
        .route("/v1/sessions/events", get(streams::session_events))
        .route("/v1/auth/challenges/events", get(streams::challenge_events))
        .route(
            "/v1/auth/challenges/{account_name}/code",
            post(streams::submit_challenge_code),
        )
        .route("/v1/agents", get(agents::list_agents))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ));

    // Session events are reported by both operators and agents.
    let shared = Router::new()
        .route("/v1/sessions/events", post(streams::post_session_event))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin_or_agent,
        ));

    let agent = Router::new()
        .route("/v1/agent/ws", get(agents::agent_ws))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_agent,
        ));

    let mut public = Router::new().route("/healthz", get(healthz));
    if state.config.enable_swagger {
        public = public.route("/openapi.json", get(openapi::document));
    }

    Router::new()
        .merge(admin)
        .merge(shared)
        .merge(agent)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

/// HTTP-facing error. One `IntoResponse` impl owns the status mapping.
#[derive(Debug)]
pub enum ApiError {
    /// 400 with `{"error": ...}`.
    InvalidRequest(String),
    /// 401 with no body.
    Unauthorized,
    /// 404 with `{"error": ...}`.
    NotFound(String),
    /// 500; detail is logged, never returned.
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::InvalidArgument(msg) => ApiError::InvalidRequest(msg),
            StoreError::NotFound(msg) => ApiError::NotFound(msg),
            other => {
                error!(error = %other, "store operation failed");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response(),
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            ApiError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": msg })),
            )
                .into_response(),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
                .into_response(),
        }
    }
}
