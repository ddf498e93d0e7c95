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

//! Router-level tests: scopes, status codes, and wire shapes.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use futures::StreamExt;
use http_body_util::BodyExt;
use tower::ServiceExt;

use bosun::api::router;

use crate::fixtures::{app_state, create_job, hello, test_config, ADMIN_KEY, AGENT_KEY};

fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(path: &str, token: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_requires_no_auth() {
    let app = router(app_state().await);
    let response = app.oneshot(get("/healthz", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "ok": true }));
}

#[tokio::test]
async fn admin_routes_reject_missing_and_wrong_tokens() {
    let state = app_state().await;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(get("/v1/jobs", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get("/v1/jobs", Some("bogus")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // The agent key does not unlock admin routes.
    let response = app.oneshot(get("/v1/jobs", Some(AGENT_KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_job_returns_202_with_location() {
    let app = router(app_state().await);
    let response = app
        .oneshot(post_json(
            "/v1/jobs",
            Some(ADMIN_KEY),
            serde_json::json!({
                "action": "ping",
                "region": "local",
                "targets": ["acct-1"],
                "meta": { "note": "smoke" }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .expect("Location header");

    let body = json_body(response).await;
    let job = &body["job"];
    assert_eq!(job["status"], "Queued");
    assert_eq!(job["action"], "ping");
    assert_eq!(job["region"], "local");
    assert_eq!(job["targets"], serde_json::json!(["acct-1"]));
    assert_eq!(job["meta"]["note"], "smoke");
    let id = job["id"].as_str().unwrap();
    assert_eq!(id.len(), 32);
    assert_eq!(location, format!("/v1/jobs/{id}"));
    // Wire timestamps are ISO-8601 with millisecond precision.
    let created = job["createdAt"].as_str().unwrap();
    assert!(created.ends_with('Z') && created.contains('.'));
}

#[tokio::test]
async fn create_job_rejects_empty_inputs() {
    let app = router(app_state().await);

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/jobs",
            Some(ADMIN_KEY),
            serde_json::json!({ "action": "ping", "targets": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(post_json(
            "/v1/jobs",
            Some(ADMIN_KEY),
            serde_json::json!({ "targets": ["acct-1"] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("action"));
}

#[tokio::test]
async fn get_job_round_trips_and_404s() {
    let state = app_state().await;
    let (job, _) = create_job(&state.dal, "eu", &["acct-1", "acct-2"]).await;
    let app = router(state);

    let response = app
        .clone()
        .oneshot(get(&format!("/v1/jobs/{}", job.id), Some(ADMIN_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["job"]["id"], serde_json::json!(job.id));
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
    assert_eq!(body["tasks"][0]["target"], "acct-1");
    assert_eq!(body["tasks"][0]["jobId"], serde_json::json!(job.id));

    let response = app
        .oneshot(get("/v1/jobs/00000000000000000000000000000000", Some(ADMIN_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_jobs_defaults_and_orders() {
    let state = app_state().await;
    create_job(&state.dal, "", &["a"]).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (newest, _) = create_job(&state.dal, "", &["b"]).await;
    let app = router(state);

    let response = app.oneshot(get("/v1/jobs", Some(ADMIN_KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["id"], serde_json::json!(newest.id));
}

#[tokio::test]
async fn cancel_job_is_idempotent_over_http() {
    let state = app_state().await;
    let (job, _) = create_job(&state.dal, "eu", &["acct-1"]).await;
    let app = router(state);

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/v1/jobs/{}/cancel", job.id),
                Some(ADMIN_KEY),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({ "ok": true }));
    }

    let response = app
        .oneshot(post_json(
            "/v1/jobs/00000000000000000000000000000000/cancel",
            Some(ADMIN_KEY),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_events_accept_admin_and_agent_posts() {
    let state = app_state().await;
    let mut stream = state.broker.subscribe_sessions(Some("acct-1"));
    let app = router(state);

    for token in [ADMIN_KEY, AGENT_KEY] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/v1/sessions/events",
                Some(token),
                serde_json::json!({
                    "accountName": "acct-1",
                    "eventType": "logon",
                    "state": "ok"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let event = stream.next().await.unwrap();
    assert_eq!(event.account_name, "acct-1");
    assert_eq!(event.event_type, "logon");
    assert_eq!(event.state, "ok");

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/sessions/events",
            Some("bogus"),
            serde_json::json!({ "accountName": "acct-1" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(post_json(
            "/v1/sessions/events",
            Some(ADMIN_KEY),
            serde_json::json!({ "eventType": "logon" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn challenge_code_routes_to_account_subscribers() {
    let state = app_state().await;
    let mut stream = state.broker.subscribe_auth_challenges(Some("acct-1"));
    let app = router(state);

    let response = app
        .clone()
        .oneshot(post_json(
            "/v1/auth/challenges/acct-1/code",
            Some(ADMIN_KEY),
            serde_json::json!({ "code": "XYZ123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let event = stream.next().await.unwrap();
    assert_eq!(event.account_name, "acct-1");
    assert_eq!(event.challenge_type, "email");
    assert_eq!(event.message.as_deref(), Some("XYZ123"));

    let response = app
        .oneshot(post_json(
            "/v1/auth/challenges/acct-1/code",
            Some(ADMIN_KEY),
            serde_json::json!({ "code": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn agents_listing_reflects_registry() {
    let state = app_state().await;
    let (_, _rx) = state.registry.register(hello("a1", "eu"));
    let app = router(state);

    let response = app.oneshot(get("/v1/agents", Some(ADMIN_KEY))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let agents = body["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0]["agentId"], "a1");
    assert_eq!(agents[0]["region"], "eu");
    assert!(agents[0]["connectedAt"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn agent_ws_requires_agent_scope_and_upgrade() {
    let app = router(app_state().await);

    let response = app
        .clone()
        .oneshot(get("/v1/agent/ws?agentId=a1&region=eu", Some(ADMIN_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Right scope but a plain GET: not upgradable.
    let response = app
        .clone()
        .oneshot(get("/v1/agent/ws?agentId=a1&region=eu", Some(AGENT_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Missing connect parameters.
    let response = app
        .oneshot(get("/v1/agent/ws", Some(AGENT_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn openapi_document_is_gated() {
    let app = router(app_state().await);
    let response = app.oneshot(get("/openapi.json", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut config = test_config();
    config.enable_swagger = true;
    let app = router(crate::fixtures::app_state_with_config(config).await);
    let response = app.oneshot(get("/openapi.json", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert!(body["paths"]["/v1/jobs"].is_object());
}

#[tokio::test]
async fn job_event_stream_opens_with_ready_sentinel() {
    let state = app_state().await;
    let (job, _) = create_job(&state.dal, "eu", &["acct-1"]).await;
    let broker = state.broker.clone();
    let app = router(state);

    let response = app
        .clone()
        .oneshot(get(&format!("/v1/jobs/{}/events", job.id), Some(ADMIN_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .starts_with("text/event-stream"));

    let mut body = response.into_body().into_data_stream();
    let first = tokio::time::timeout(std::time::Duration::from_secs(1), body.next())
        .await
        .expect("ready frame in time")
        .unwrap()
        .unwrap();
    let first = String::from_utf8_lossy(&first).to_string();
    assert!(first.contains("event: ready"), "got: {first}");

    broker.publish_job_event(&job.id, "task.dispatched", None);
    let second = tokio::time::timeout(std::time::Duration::from_secs(1), body.next())
        .await
        .expect("event frame in time")
        .unwrap()
        .unwrap();
    let second = String::from_utf8_lossy(&second).to_string();
    assert!(second.contains("event: task.dispatched"), "got: {second}");
    assert!(second.contains("data: "));

    // Streams for unknown jobs fail before any bytes are written.
    let response = app
        .oneshot(get(
            "/v1/jobs/00000000000000000000000000000000/events",
            Some(ADMIN_KEY),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
