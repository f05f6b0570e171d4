//! DB CRUD Gateway - Main entry point.

use clap::Parser;
use db_crud_gateway::config::Config;
use db_crud_gateway::db::{ConnectionBroker, CrudEngine, SessionStore};
use db_crud_gateway::gateway::{self, AppState};
use db_crud_gateway::server::HttpServer;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber; RUST_LOG overrides `--log-level`.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e.into());
    }

    info!(
        db_host = %config.db_host,
        db_port = config.db_port,
        session_ttl_secs = config.session_ttl,
        "Starting DB CRUD Gateway v{}",
        env!("CARGO_PKG_VERSION")
    );

    let sessions = Arc::new(SessionStore::new());
    SessionStore::start_cleanup_task(sessions.clone(), config.sweep_interval_duration());

    let broker = Arc::new(ConnectionBroker::new(
        sessions.clone(),
        config.broker_settings(),
    ));
    let crud = CrudEngine::new(config.query_timeout_duration());

    let prefix = config.normalized_api_prefix();
    let app = gateway::router(AppState::new(broker, crud), &prefix);
    let mount = if prefix.is_empty() { "/" } else { prefix.as_str() };
    info!(prefix = %mount, "API routes mounted");

    let server = HttpServer::new(app, sessions, &config.http_host, config.http_port);
    if let Err(e) = server.run().await {
        error!(error = %e, "Gateway stopped with an error");
        return Err(e.into());
    }

    info!("Gateway stopped");
    Ok(())
}
