//! HTTP listener lifecycle.
//!
//! [`router`] wires the five-endpoint surface; [`start`] binds the
//! listener, flips `bridge_active` and serves in a background task until
//! the returned [`ServerHandle`] is shut down. Method mismatches on
//! registered paths get the router's automatic 405.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::handlers;
use crate::state::BridgeState;

/// Build the bridge router over shared state.
pub fn router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/log_trade", post(handlers::log_trade))
        .route("/mt5/get_trade", get(handlers::get_trade))
        .route("/health", get(handlers::health))
        .route("/notify_hedge_close", post(handlers::notify_hedge_close))
        .route("/nt_close_hedge", post(handlers::nt_close_hedge))
        .route("/mt5/trade_result", post(handlers::trade_result))
        .with_state(state)
}

/// A running HTTP listener.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl ServerHandle {
    /// The address actually bound (resolves port 0 in tests).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Initiate graceful shutdown and wait up to `deadline` for in-flight
    /// handlers to complete; the serve task is aborted past the deadline.
    pub async fn shutdown(mut self, deadline: Duration) {
        let _ = self.shutdown_tx.send(());
        if tokio::time::timeout(deadline, &mut self.join).await.is_err() {
            error!("graceful shutdown deadline exceeded, aborting listener");
            self.join.abort();
        }
    }
}

/// Bind the listener and serve in a background task.
///
/// `bridge_active` is raised once the bind succeeds and dropped when the
/// serve loop exits, however it exits.
pub async fn start(state: Arc<BridgeState>, addr: SocketAddr) -> Result<ServerHandle> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind bridge listener on {}", addr))?;
    let local_addr = listener
        .local_addr()
        .context("failed to read bound listener address")?;

    state.set_bridge_active(true);
    let (net_position, hedge_size) = state.ledger_snapshot();
    info!(
        addr = %local_addr,
        net_position,
        hedge_size,
        queue_size = state.queue().len(),
        "bridge listener started"
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = router(state.clone());
    let serve_state = state.clone();

    let join = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(e) = result {
            error!(error = %e, "bridge listener failed");
        }
        serve_state.set_bridge_active(false);
        info!("bridge listener stopped");
    });

    Ok(ServerHandle {
        local_addr,
        shutdown_tx,
        join,
    })
}
