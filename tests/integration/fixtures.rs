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

//! Shared helpers: fresh in-memory stores, canned requests, and a fully
//! wired application state for router-level tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bosun::api::AppState;
use bosun::dal::NewJobRequest;
use bosun::models::{AgentHello, Job, Task};
use bosun::{AgentRegistry, Config, Dal, Database, EventBroker};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const AGENT_KEY: &str = "test-agent-key";

/// A DAL over a fresh, private in-memory store.
pub async fn memory_dal() -> Dal {
    let database = Database::open(":memory:").await.expect("open in-memory store");
    Dal::new(database)
}

pub fn test_config() -> Config {
    Config {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        admin_api_key: ADMIN_KEY.to_string(),
        agent_api_keys: vec![AGENT_KEY.to_string()],
        db_path: ":memory:".to_string(),
        task_lease: Duration::from_secs(300),
        enable_swagger: false,
    }
}

/// Fully wired state over a fresh store, plus handles for direct poking.
pub async fn app_state() -> AppState {
    app_state_with_config(test_config()).await
}

pub async fn app_state_with_config(config: Config) -> AppState {
    AppState {
        dal: memory_dal().await,
        broker: EventBroker::new(),
        registry: AgentRegistry::new(),
        config: Arc::new(config),
    }
}

pub fn job_request(region: &str, targets: &[&str]) -> NewJobRequest {
    NewJobRequest {
        action: "ping".to_string(),
        region: region.to_string(),
        targets: targets.iter().map(|t| t.to_string()).collect(),
        payload: serde_json::Map::new(),
        meta: HashMap::new(),
    }
}

pub async fn create_job(dal: &Dal, region: &str, targets: &[&str]) -> (Job, Vec<Task>) {
    dal.jobs()
        .create(job_request(region, targets))
        .await
        .expect("create job")
}

pub fn hello(agent_id: &str, region: &str) -> AgentHello {
    AgentHello {
        agent_id: agent_id.to_string(),
        region: region.to_string(),
        capabilities: HashMap::new(),
        meta: HashMap::new(),
    }
}
