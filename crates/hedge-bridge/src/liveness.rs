//! Per-peer liveness tracking.
//!
//! Each peer has its own mutex so upstream traffic never blocks
//! downstream liveness reads and vice versa. Both flags latch true:
//! the upstream flag only drops when a reconnect probe fails, the
//! downstream flag stays raised once the first ping arrives.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::trace;

use crate::state::BridgeState;

/// Interval of the background staleness sweep.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// A peer ping within this window counts as a live connection.
pub const PING_FRESHNESS: Duration = Duration::from_secs(60);

/// Upstream client ("addon") connection state.
#[derive(Debug, Default)]
pub struct UpstreamStatus {
    pub connected: bool,
    pub last_seen: Option<Instant>,
}

/// Downstream executor ("hedgebot") connection state.
#[derive(Debug, Default)]
pub struct DownstreamStatus {
    pub active: bool,
    pub last_ping: Option<Instant>,
}

/// Spawn the 10-second upstream staleness sweep.
///
/// The sweep observes staleness without downgrading the connected flag;
/// upstream stays latched true until a reconnect probe fails.
pub fn spawn_upstream_sweep(state: Arc<BridgeState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // The first tick fires immediately; skip it.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.upstream_seen_elapsed() {
                Some(elapsed) => {
                    trace!(
                        elapsed_secs = elapsed.as_secs(),
                        stale = elapsed > PING_FRESHNESS,
                        "upstream liveness sweep"
                    );
                }
                None => trace!("upstream liveness sweep: never seen"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_disconnected() {
        let upstream = UpstreamStatus::default();
        assert!(!upstream.connected);
        assert!(upstream.last_seen.is_none());

        let downstream = DownstreamStatus::default();
        assert!(!downstream.active);
        assert!(downstream.last_ping.is_none());
    }
}
