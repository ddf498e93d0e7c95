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

//! Job submission, inspection, and cancellation handlers.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::dal::NewJobRequest;
use crate::models::{Job, Task};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobBody {
    #[serde(default)]
    action: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    targets: Vec<String>,
    #[serde(default)]
    payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    meta: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: Job,
}

#[derive(Debug, Serialize)]
pub struct JobsResponse {
    pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
pub struct JobDetailResponse {
    pub job: Job,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    limit: Option<i64>,
}

const DEFAULT_LIST_LIMIT: i64 = 50;

pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<CreateJobBody>,
) -> Result<impl IntoResponse, ApiError> {
    let (job, _tasks) = state
        .dal
        .jobs()
        .create(NewJobRequest {
            action: body.action,
            region: body.region,
            targets: body.targets,
            payload: body.payload,
            meta: body.meta,
        })
        .await?;

    info!(job_id = %job.id, action = %job.action, targets = job.targets.len(), "job accepted");
    let mut payload = serde_json::Map::new();
    payload.insert("status".into(), serde_json::json!(job.status));
    state
        .broker
        .publish_job_event(&job.id, "job.created", Some(payload));

    let location = format!("/v1/jobs/{}", job.id);
    Ok((
        StatusCode::ACCEPTED,
        [(header::LOCATION, location)],
        Json(JobResponse { job }),
    ))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<JobsResponse>, ApiError> {
    let jobs = state
        .dal
        .jobs()
        .list(query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(JobsResponse { jobs }))
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobDetailResponse>, ApiError> {
    let (job, tasks) = state.dal.jobs().get(&id).await?;
    Ok(Json(JobDetailResponse { job, tasks }))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.dal.jobs().cancel(&id).await?;
    info!(job_id = %id, "job canceled");
    Ok(Json(serde_json::json!({ "ok": true })))
}
