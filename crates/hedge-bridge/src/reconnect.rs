//! Reconnect coordination for the three moving parts: the bridge's own
//! listener, the downstream executor and the upstream addon.
//!
//! The bridge retry restarts the HTTP listener; the downstream check is
//! passive (ping freshness); the upstream check actively probes the
//! addon's ping endpoint. When no retry flag is set, the upstream probe
//! runs by default.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::events::UiEvent;
use crate::liveness::PING_FRESHNESS;
use crate::server::{self, ServerHandle};
use crate::state::BridgeState;

/// Deadline for shutting down a previous listener before restarting.
const RESTART_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

/// Outcome of one reconnect attempt for one peer. `success` is `None`
/// when the attempt was not requested.
#[derive(Debug, Clone, Serialize)]
pub struct PeerAttempt {
    pub attempted: bool,
    pub success: Option<bool>,
    pub message: String,
}

impl PeerAttempt {
    fn skipped(what: &str) -> Self {
        Self {
            attempted: false,
            success: None,
            message: format!("{} reconnection not requested", what),
        }
    }

    fn done(success: bool, message: impl Into<String>) -> Self {
        Self {
            attempted: true,
            success: Some(success),
            message: message.into(),
        }
    }
}

/// Per-peer outcomes of a reconnect request.
#[derive(Debug, Clone, Serialize)]
pub struct ReconnectReport {
    pub bridge: PeerAttempt,
    pub downstream: PeerAttempt,
    pub upstream: PeerAttempt,
}

/// Owns the listener handle and performs reconnect attempts on request.
pub struct ReconnectCoordinator {
    state: Arc<BridgeState>,
    bind_addr: SocketAddr,
    server: tokio::sync::Mutex<Option<ServerHandle>>,
}

impl ReconnectCoordinator {
    pub fn new(state: Arc<BridgeState>, bind_addr: SocketAddr) -> Self {
        Self {
            state,
            bind_addr,
            server: tokio::sync::Mutex::new(None),
        }
    }

    /// Hand over a running listener so a later bridge retry can shut it
    /// down before restarting.
    pub async fn install_server(&self, handle: ServerHandle) {
        *self.server.lock().await = Some(handle);
    }

    /// Shut the owned listener down, if any. Used at process exit.
    pub async fn shutdown_server(&self, deadline: Duration) {
        if let Some(handle) = self.server.lock().await.take() {
            handle.shutdown(deadline).await;
        }
    }

    /// Attempt to re-establish the requested connections. With all flags
    /// false, only the upstream probe runs.
    pub async fn attempt_reconnect(
        &self,
        retry_bridge: bool,
        retry_downstream: bool,
        retry_upstream: bool,
    ) -> ReconnectReport {
        let bridge = if retry_bridge {
            self.retry_bridge().await
        } else {
            PeerAttempt::skipped("bridge")
        };

        let downstream = if retry_downstream {
            self.check_downstream()
        } else {
            PeerAttempt::skipped("downstream")
        };

        let probe_by_default = !retry_bridge && !retry_downstream && !retry_upstream;
        let upstream = if retry_upstream || probe_by_default {
            self.probe_upstream().await
        } else {
            PeerAttempt::skipped("upstream")
        };

        let report = ReconnectReport {
            bridge,
            downstream,
            upstream,
        };
        info!(report = ?report, "reconnect attempt finished");
        report
    }

    async fn retry_bridge(&self) -> PeerAttempt {
        if self.state.bridge_active() {
            return PeerAttempt::done(true, "bridge listener already active");
        }

        let mut slot = self.server.lock().await;
        if let Some(previous) = slot.take() {
            info!("shutting down previous bridge listener before restart");
            previous.shutdown(RESTART_SHUTDOWN_DEADLINE).await;
        }

        match server::start(self.state.clone(), self.bind_addr).await {
            Ok(handle) => {
                *slot = Some(handle);
                if self.state.bridge_active() {
                    PeerAttempt::done(true, "bridge listener restarted")
                } else {
                    PeerAttempt::done(false, "bridge listener restart did not come up")
                }
            }
            Err(e) => {
                warn!(error = %e, "bridge listener restart failed");
                PeerAttempt::done(false, format!("failed to restart bridge listener: {:#}", e))
            }
        }
    }

    fn check_downstream(&self) -> PeerAttempt {
        match self.state.downstream_ping_elapsed() {
            Some(elapsed) if elapsed <= PING_FRESHNESS => PeerAttempt::done(
                true,
                format!(
                    "downstream ping received {}s ago, connection verified",
                    elapsed.as_secs()
                ),
            ),
            Some(elapsed) => PeerAttempt::done(
                false,
                format!(
                    "downstream ping is stale, last received {}s ago",
                    elapsed.as_secs()
                ),
            ),
            None => PeerAttempt::done(
                false,
                "no downstream ping has ever been received",
            ),
        }
    }

    async fn probe_upstream(&self) -> PeerAttempt {
        let attempt = match self.state.upstream_client().ping().await {
            Ok(status) if status.is_success() => {
                self.state.mark_upstream_seen();
                PeerAttempt::done(true, "upstream ping successful")
            }
            Ok(status) => {
                self.state.set_upstream_connected(false);
                PeerAttempt::done(
                    false,
                    format!("upstream ping returned status {}", status.as_u16()),
                )
            }
            Err(e) => {
                self.state.set_upstream_connected(false);
                PeerAttempt::done(false, format!("upstream ping failed: {}", e))
            }
        };

        self.state.emit(UiEvent::AddonRetryResult {
            success: attempt.success.unwrap_or(false),
            message: attempt.message.clone(),
        });
        attempt
    }
}
