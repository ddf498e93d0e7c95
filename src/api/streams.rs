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

//! Server-sent event streams and the event-posting endpoints.
//!
//! Every stream opens with a synthetic `ready` event so clients can tell a
//! live connection from a dead idle one, then relays each broker event as
//! `event: <type>` / `data: <event-json>` until the client disconnects.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::models::{AuthChallengeEvent, SessionEvent};

fn ready_event() -> Event {
    Event::default().event("ready").data("{}")
}

fn sse_event<T: Serialize>(kind: &str, event: &T) -> Event {
    Event::default()
        .event(kind)
        .data(serde_json::to_string(event).unwrap_or_default())
}

fn sse_response<S>(
    events: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = Event> + Send + 'static,
{
    let stream = futures::stream::once(async { ready_event() })
        .chain(events)
        .map(Ok::<Event, Infallible>);
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text(""))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountQuery {
    account_name: Option<String>,
}

impl AccountQuery {
    /// An omitted or blank filter means the wildcard subscription.
    fn account(&self) -> Option<&str> {
        self.account_name.as_deref().filter(|a| !a.is_empty())
    }
}

/// `GET /v1/jobs/{id}/events`: the job's progress stream.
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // 404 must surface before the stream starts.
    state.dal.jobs().get(&id).await?;
    let events = state.broker.subscribe_job(&id).map(|event| {
        let kind = event.event_type.clone();
        sse_event(&kind, &event)
    });
    Ok(sse_response(events))
}

/// `GET /v1/sessions/events?accountName=`: session stream, wildcard when
/// the filter is omitted.
pub async fn session_events(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state.broker.subscribe_sessions(query.account()).map(|event| {
        let kind = event.event_type.clone();
        sse_event(&kind, &event)
    });
    sse_response(events)
}

/// `GET /v1/auth/challenges/events?accountName=`: challenge stream.
pub async fn challenge_events(
    State(state): State<AppState>,
    Query(query): Query<AccountQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = state
        .broker
        .subscribe_auth_challenges(query.account())
        .map(|event| {
            let kind = event.challenge_type.clone();
            sse_event(&kind, &event)
        });
    sse_response(events)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSessionEventBody {
    #[serde(default)]
    account_name: String,
    event_type: Option<String>,
    state: Option<String>,
    message: Option<String>,
}

/// `POST /v1/sessions/events`: agents and operators report session state.
pub async fn post_session_event(
    State(state): State<AppState>,
    Json(body): Json<PostSessionEventBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.account_name.is_empty() {
        return Err(ApiError::InvalidRequest("accountName is required".into()));
    }
    state.broker.publish_session_event(SessionEvent::new(
        body.account_name,
        body.event_type.unwrap_or_else(|| "status".into()),
        body.state.unwrap_or_default(),
        body.message,
    ));
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct SubmitCodeBody {
    #[serde(default)]
    code: String,
    #[serde(rename = "type")]
    challenge_type: Option<String>,
}

/// `POST /v1/auth/challenges/{accountName}/code`: routes a submitted code
/// to the account's challenge subscribers.
pub async fn submit_challenge_code(
    State(state): State<AppState>,
    Path(account_name): Path<String>,
    Json(body): Json<SubmitCodeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.code.is_empty() {
        return Err(ApiError::InvalidRequest("code is required".into()));
    }
    state.broker.publish_auth_challenge(AuthChallengeEvent::new(
        account_name,
        body.challenge_type.unwrap_or_else(|| "email".into()),
        Some(body.code),
        None,
    ));
    Ok(Json(serde_json::json!({ "ok": true })))
}
