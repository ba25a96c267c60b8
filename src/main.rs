//! ==============================================================================
//! main.rs - plant monitor entry point
//! ==============================================================================
//!
//! purpose:
//!     one binary for every piece of the plant monitor. `[node] role` in
//!     host.toml decides which of them this process runs.
//!
//! responsibilities:
//!     - load configuration and set up logging
//!     - reading store: hold the latest snapshot, accept pushes (port 3001)
//!     - dashboard: poll the store every 2s, keep per-metric history, serve
//!       the page and json (port 3000)
//!     - sensor: push simulated readings to the store
//!     - shut everything down on ctrl-c
//!
//! architecture:
//!
//!     ┌────────────────┐  POST /api/nodeMCU-data  ┌────────────────────┐
//!     │ sensor node    │ ───────────────────────> │ reading store      │
//!     │ (sensor.rs)    │                          │ (store.rs, 3001)   │
//!     └────────────────┘                          └─────────┬──────────┘
//!                                                           │ GET /api/sensor-data
//!                                                           │ every 2s
//!                                                 ┌─────────┴──────────┐
//!                                                 │ poller + history   │
//!                                                 │ (poller.rs)        │
//!                                                 └─────────┬──────────┘
//!                                                           │ SharedView
//!                                                 ┌─────────┴──────────┐
//!                                                 │ dashboard (3000)   │
//!                                                 └────────────────────┘
//!
//! usage:
//!     plant-monitor [path/to/host.toml]
//!     RUST_LOG overrides logging.level
//!
//! ==============================================================================

mod config;
mod dashboard;
mod domain;
mod error;
mod history;
mod poller;
mod sensor;
mod server;
mod store;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use config::HostConfig;
use history::HistoryBuffer;
use poller::{DashboardView, HttpSource, Poller, SharedView, TaskHandle};
use sensor::SimulatedSensor;
use server::StoreState;
use store::ReadingStore;

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // step 1: load configuration
    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, loaded_from, warnings) = HostConfig::load_or_default(explicit.as_deref());

    init_logging(&config.logging.level);
    tracing::info!("plant-monitor v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &loaded_from {
        tracing::info!(path = %path.display(), "loaded config");
    }
    for warning in &warnings {
        tracing::warn!("{}", warning);
    }
    config.log_summary();

    let role = config.node.role;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = JoinSet::new();
    let mut tasks: Vec<TaskHandle> = Vec::new();

    // step 2: reading store
    if role.runs_store() {
        let state = StoreState {
            store: ReadingStore::default(),
            response_delay: Duration::from_millis(config.server.response_delay_ms),
            show_sensor_data: config.logging.show_sensor_data,
        };
        let app = server::store_router(state, server::cors_layer(&config.server.allowed_origin)?);
        servers.spawn(server::run_server(
            config.server.bind.clone(),
            app,
            shutdown_signal(shutdown_rx.clone()),
        ));
    }

    // step 3: poller, history and dashboard
    if role.runs_dashboard() {
        let view = dashboard_view(&config);
        let source = HttpSource::new(
            config.polling.server_url.clone(),
            config.polling.request_timeout(),
        )
        .context("failed to build http client")?;
        let poller = Poller::new(source, config.polling.interval(), view.clone())
            .show_sensor_data(config.logging.show_sensor_data);
        tasks.push(poller.start());

        servers.spawn(server::run_server(
            config.dashboard.bind.clone(),
            server::dashboard_router(view),
            shutdown_signal(shutdown_rx.clone()),
        ));
    }

    // step 4: simulated sensor node
    if role.runs_sensor() {
        let sensor = SimulatedSensor::new(
            config.sensor.push_url.clone(),
            Duration::from_millis(config.sensor.interval_ms),
        )
        .context("failed to build http client")?;
        tasks.push(sensor.start());
    }

    // step 5: run until ctrl-c or a server dies
    let mut outcome = Ok(());
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            tracing::info!("shutting down");
        }
        Some(joined) = servers.join_next() => {
            outcome = flatten(joined);
            if let Err(e) = &outcome {
                tracing::error!(error = %format!("{:#}", e), "server stopped");
            }
        }
    }

    for task in tasks {
        task.stop();
    }
    let _ = shutdown_tx.send(true);
    while let Some(joined) = servers.join_next().await {
        if let Err(e) = flatten(joined) {
            tracing::error!(error = %format!("{:#}", e), "server error during shutdown");
        }
    }
    outcome
}

fn init_logging(level: &str) {
    // RUST_LOG wins over host.toml
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn dashboard_view(config: &HostConfig) -> SharedView {
    let mut history = HistoryBuffer::new(config.history.policy());
    if config.history.seed_placeholder {
        history.seed_placeholder(domain::timestamp_ms(), &mut rand::thread_rng());
    }
    Arc::new(RwLock::new(DashboardView::new(history)))
}

async fn shutdown_signal(mut rx: watch::Receiver<bool>) {
    let _ = rx.changed().await;
}

fn flatten(joined: Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    joined.context("server task panicked")?
}
