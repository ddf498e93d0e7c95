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

//! Static OpenAPI document, mounted when `ENABLE_SWAGGER` is set.

use axum::Json;

pub async fn document() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "openapi": "3.0.3",
        "info": {
            "title": "bosun control plane",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "components": {
            "securitySchemes": {
                "bearer": { "type": "http", "scheme": "bearer" }
            }
        },
        "paths": {
            "/healthz": {
                "get": { "summary": "Liveness probe", "responses": { "200": { "description": "ok" } } }
            },
            "/v1/jobs": {
                "post": {
                    "summary": "Submit a job",
                    "security": [{ "bearer": [] }],
                    "requestBody": { "content": { "application/json": { "schema": {
                        "type": "object",
                        "required": ["action", "targets"],
                        "properties": {
                            "action": { "type": "string" },
                            "region": { "type": "string" },
                            "targets": { "type": "array", "items": { "type": "string" } },
                            "payload": { "type": "object" },
                            "meta": { "type": "object" }
                        }
                    } } } },
                    "responses": {
                        "202": { "description": "job accepted" },
                        "400": { "description": "empty action or targets" },
                        "401": { "description": "unauthorized" }
                    }
                },
                "get": {
                    "summary": "List jobs, newest first",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "limit", "in": "query", "schema": { "type": "integer", "minimum": 1, "maximum": 500 } }],
                    "responses": { "200": { "description": "jobs" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/jobs/{id}": {
                "get": {
                    "summary": "Job with its tasks",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "job detail" }, "404": { "description": "unknown job" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/jobs/{id}/cancel": {
                "post": {
                    "summary": "Cancel a job and its pending tasks",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "canceled" }, "404": { "description": "unknown job" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/jobs/{id}/events": {
                "get": {
                    "summary": "Job progress stream (SSE)",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "id", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "event stream" }, "404": { "description": "unknown job" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/sessions/events": {
                "get": {
                    "summary": "Session event stream (SSE); omit accountName for all accounts",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "accountName", "in": "query", "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "event stream" }, "401": { "description": "unauthorized" } }
                },
                "post": {
                    "summary": "Report a session event",
                    "security": [{ "bearer": [] }],
                    "responses": { "200": { "description": "published" }, "400": { "description": "missing accountName" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/auth/challenges/events": {
                "get": {
                    "summary": "Auth challenge stream (SSE)",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "accountName", "in": "query", "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "event stream" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/auth/challenges/{accountName}/code": {
                "post": {
                    "summary": "Submit an auth challenge code",
                    "security": [{ "bearer": [] }],
                    "parameters": [{ "name": "accountName", "in": "path", "required": true, "schema": { "type": "string" } }],
                    "responses": { "200": { "description": "routed" }, "400": { "description": "missing code" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/agents": {
                "get": {
                    "summary": "Connected agents",
                    "security": [{ "bearer": [] }],
                    "responses": { "200": { "description": "agents" }, "401": { "description": "unauthorized" } }
                }
            },
            "/v1/agent/ws": {
                "get": {
                    "summary": "Agent tunnel upgrade",
                    "security": [{ "bearer": [] }],
                    "parameters": [
                        { "name": "agentId", "in": "query", "required": true, "schema": { "type": "string" } },
                        { "name": "region", "in": "query", "required": true, "schema": { "type": "string" } }
                    ],
                    "responses": { "101": { "description": "switching protocols" }, "400": { "description": "missing parameters" }, "401": { "description": "unauthorized" } }
                }
            }
        }
    }))
}
