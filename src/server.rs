//! HTTP listener and shutdown sequencing.
//!
//! The router is served on a background task. The first SIGINT/SIGTERM stops
//! accepting connections and gives in-flight requests [`GRACEFUL_TIMEOUT`] to
//! finish; a second signal or the timeout drops whatever is left. Session
//! connections are closed in every case.

use crate::db::SessionStore;
use crate::error::{GatewayError, GatewayResult};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

/// Time allowed for in-flight requests once shutdown starts.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

type ServeOutcome = Result<std::io::Result<()>, JoinError>;

pub struct HttpServer {
    app: Router,
    sessions: Arc<SessionStore>,
    host: String,
    port: u16,
}

impl HttpServer {
    pub fn new(app: Router, sessions: Arc<SessionStore>, host: impl Into<String>, port: u16) -> Self {
        Self {
            app,
            sessions,
            host: host.into(),
            port,
        }
    }

    /// `host:port` the listener binds.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Serve until a shutdown signal, then close every session connection.
    pub async fn run(self) -> GatewayResult<()> {
        let addr = self.bind_addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            GatewayError::connection(
                format!("Cannot listen on {}: {}", addr, e),
                "Pick a free port with --http-port",
            )
        })?;
        info!(%addr, "Gateway listening");

        let Self { app, sessions, .. } = self;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let mut serving = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = stop_rx.await;
                })
                .await
        });

        let outcome = tokio::select! {
            joined = &mut serving => joined,
            _ = shutdown_signal() => {
                let _ = stop_tx.send(());
                drain(&mut serving).await
            }
        };

        info!(sessions = sessions.count().await, "Closing session connections");
        sessions.close_all().await;

        match outcome {
            Ok(Ok(())) => {
                info!("HTTP server stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(GatewayError::internal(format!("HTTP server error: {}", e))),
            Err(e) => Err(GatewayError::internal(format!("HTTP server task failed: {}", e))),
        }
    }
}

/// Wait for the serve task to finish after the stop request.
async fn drain(serving: &mut JoinHandle<std::io::Result<()>>) -> ServeOutcome {
    info!(
        grace_secs = GRACEFUL_TIMEOUT.as_secs(),
        "Draining in-flight requests; signal again to stop immediately"
    );
    tokio::select! {
        finished = tokio::time::timeout(GRACEFUL_TIMEOUT, &mut *serving) => {
            if let Ok(outcome) = finished {
                return outcome;
            }
            warn!("Grace period elapsed, dropping open connections");
        }
        _ = shutdown_signal() => warn!("Second signal received, dropping open connections"),
    }
    serving.abort();
    Ok(Ok(()))
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            },
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                let _ = tokio::signal::ctrl_c().await;
                info!("SIGINT received");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("SIGINT received");
    }
}
