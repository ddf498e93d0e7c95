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

//! Control plane server binary.
//!
//! Exits 0 on clean shutdown; any startup failure (configuration, store
//! open, port bind) surfaces through anyhow and exits non-zero.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bosun::api::{self, AppState};
use bosun::{AgentRegistry, Config, Dal, Database, Dispatcher, EventBroker};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;

    if config.db_path != ":memory:" {
        if let Some(parent) = std::path::Path::new(&config.db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
    }

    let database = Database::open(&config.db_path)
        .await
        .context("opening job store")?;
    let dal = Dal::new(database);
    let broker = EventBroker::new();
    let registry = AgentRegistry::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = Dispatcher::new(
        dal.clone(),
        registry.clone(),
        broker.clone(),
        config.task_lease,
    );
    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_rx));

    let state = AppState {
        dal,
        broker,
        registry,
        config: Arc::new(config.clone()),
    };
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!(addr = %config.listen_addr, "control plane listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    // Stop the dispatcher before reporting the clean exit.
    let _ = shutdown_tx.send(true);
    let _ = dispatcher_handle.await;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
