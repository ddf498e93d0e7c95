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

//! Bearer-token checks for the two scopes, applied as route layers.
//!
//! Failures return 401 with no body. Token values never reach the logs.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use super::AppState;

pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if is_admin(&state, req.headers()) {
        next.run(req).await
    } else {
        debug!(path = %req.uri().path(), "admin scope rejected");
        StatusCode::UNAUTHORIZED.into_response()
    }
}

pub async fn require_agent(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if is_agent(&state, req.headers()) {
        next.run(req).await
    } else {
        debug!(path = %req.uri().path(), "agent scope rejected");
        StatusCode::UNAUTHORIZED.into_response()
    }
}

pub async fn require_admin_or_agent(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    if is_admin(&state, req.headers()) || is_agent(&state, req.headers()) {
        next.run(req).await
    } else {
        debug!(path = %req.uri().path(), "shared scope rejected");
        StatusCode::UNAUTHORIZED.into_response()
    }
}

fn is_admin(state: &AppState, headers: &HeaderMap) -> bool {
    bearer_token(headers).is_some_and(|token| token == state.config.admin_api_key)
}

fn is_agent(state: &AppState, headers: &HeaderMap) -> bool {
    bearer_token(headers)
        .is_some_and(|token| state.config.agent_api_keys.iter().any(|k| k == token))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
