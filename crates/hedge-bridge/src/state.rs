//! Shared bridge state.
//!
//! A single [`BridgeState`] value spans startup to shutdown and is shared
//! by every request handler behind an `Arc`. Tests instantiate isolated
//! instances in parallel; nothing here is process-global.
//!
//! ## Locking discipline
//!
//! The ledger, history and the two liveness trackers each sit behind
//! their own mutex. Locks are held for the copy or the arithmetic only,
//! never across outbound HTTP calls, and never nested: snapshot methods
//! take each mutex in turn and copy values out before releasing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::events::{UiEvent, UiEventSink};
use crate::ledger::Ledger;
use crate::liveness::{DownstreamStatus, UpstreamStatus};
use crate::queue::TradeQueue;
use crate::types::Trade;
use crate::upstream::UpstreamClient;

/// Shared reference to the bridge state.
pub type SharedBridgeState = Arc<BridgeState>;

/// The consolidated application state: queue, ledger, history, liveness,
/// the upstream client and the UI event sink.
pub struct BridgeState {
    config: BridgeConfig,
    queue: TradeQueue,
    ledger: Mutex<Ledger>,
    history: Mutex<Vec<Trade>>,
    upstream_status: Mutex<UpstreamStatus>,
    downstream_status: Mutex<DownstreamStatus>,
    upstream: UpstreamClient,
    events: Arc<dyn UiEventSink>,
}

/// Point-in-time status snapshot for the embedding UI.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    pub bridge_active: bool,
    pub upstream_connected: bool,
    pub downstream_active: bool,
    pub net_position: i64,
    pub hedge_size: f64,
    pub queue_size: usize,
}

impl BridgeState {
    pub fn new(config: BridgeConfig, events: Arc<dyn UiEventSink>) -> Self {
        let upstream = UpstreamClient::new(&config.upstream);
        let queue = TradeQueue::new(config.queue_capacity);
        Self {
            config,
            queue,
            ledger: Mutex::new(Ledger::new()),
            history: Mutex::new(Vec::new()),
            upstream_status: Mutex::new(UpstreamStatus::default()),
            downstream_status: Mutex::new(DownstreamStatus::default()),
            upstream,
            events,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn queue(&self) -> &TradeQueue {
        &self.queue
    }

    pub fn upstream_client(&self) -> &UpstreamClient {
        &self.upstream
    }

    /// Fire a UI event. Never blocks.
    pub fn emit(&self, event: UiEvent) {
        self.events.emit(event);
    }

    // ------------------------------------------------------------------
    // Ledger
    // ------------------------------------------------------------------

    /// Apply an accepted intake record to the ledger. Returns the
    /// post-update position when it moved.
    pub fn apply_trade(&self, trade: &Trade) -> Option<(i64, f64)> {
        let mut ledger = self.ledger.lock();
        if ledger.apply_trade(trade) {
            Some((ledger.net_position, ledger.hedge_size))
        } else {
            None
        }
    }

    /// Apply a signed contract delta from an upstream closure.
    pub fn apply_position_delta(&self, delta: i64) -> (i64, f64) {
        let mut ledger = self.ledger.lock();
        ledger.apply_delta(delta);
        (ledger.net_position, ledger.hedge_size)
    }

    /// Re-assert the hedge-size invariant, logging if a corrective write
    /// was needed.
    pub fn reconcile_hedge_size(&self) -> (i64, f64) {
        let (corrected, net, hedge) = {
            let mut ledger = self.ledger.lock();
            (ledger.reconcile(), ledger.net_position, ledger.hedge_size)
        };
        if corrected {
            warn!(net_position = net, hedge_size = hedge, "hedge size drifted from net position, corrected");
        }
        (net, hedge)
    }

    /// Zero-position reset rule: when the downstream executor reports no
    /// open positions, force the ledger to zero. Returns true when a
    /// reset actually happened.
    pub fn reset_if_position_held(&self) -> bool {
        let reset = {
            let mut ledger = self.ledger.lock();
            if ledger.is_flat() {
                false
            } else {
                ledger.reset();
                true
            }
        };
        if reset {
            info!("downstream reported zero open positions, ledger reset");
        }
        reset
    }

    pub fn ledger_snapshot(&self) -> (i64, f64) {
        let ledger = self.ledger.lock();
        (ledger.net_position, ledger.hedge_size)
    }

    pub fn bridge_active(&self) -> bool {
        self.ledger.lock().bridge_active
    }

    pub fn set_bridge_active(&self, active: bool) {
        self.ledger.lock().bridge_active = active;
    }

    // ------------------------------------------------------------------
    // History
    // ------------------------------------------------------------------

    /// Record an accepted trade. History is append-only and unbounded.
    pub fn push_history(&self, trade: Trade) {
        self.history.lock().push(trade);
    }

    pub fn trade_history(&self) -> Vec<Trade> {
        self.history.lock().clone()
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    // ------------------------------------------------------------------
    // Liveness
    // ------------------------------------------------------------------

    /// Mark the upstream peer alive. Called before any request validation
    /// so malformed payloads still refresh liveness.
    pub fn mark_upstream_seen(&self) {
        let mut status = self.upstream_status.lock();
        if !status.connected {
            info!("upstream connection established");
        }
        status.connected = true;
        status.last_seen = Some(Instant::now());
    }

    /// Drop the upstream connected flag after a failed probe.
    pub fn set_upstream_connected(&self, connected: bool) {
        self.upstream_status.lock().connected = connected;
    }

    pub fn upstream_connected(&self) -> bool {
        self.upstream_status.lock().connected
    }

    pub fn upstream_seen_elapsed(&self) -> Option<Duration> {
        self.upstream_status.lock().last_seen.map(|t| t.elapsed())
    }

    /// Record a downstream ping. Returns true on the first activation.
    pub fn mark_downstream_ping(&self) -> bool {
        let mut status = self.downstream_status.lock();
        let first = !status.active;
        if first {
            info!("downstream connection established");
        }
        status.active = true;
        status.last_ping = Some(Instant::now());
        first
    }

    pub fn downstream_active(&self) -> bool {
        self.downstream_status.lock().active
    }

    pub fn downstream_ping_elapsed(&self) -> Option<Duration> {
        self.downstream_status.lock().last_ping.map(|t| t.elapsed())
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// Status snapshot for the embedding UI. Each mutex is taken in turn;
    /// values are copied out before the next lock.
    pub fn status(&self) -> BridgeStatus {
        let (net_position, hedge_size, bridge_active) = {
            let ledger = self.ledger.lock();
            (ledger.net_position, ledger.hedge_size, ledger.bridge_active)
        };
        let queue_size = self.queue.len();
        let upstream_connected = self.upstream_connected();
        let downstream_active = self.downstream_active();

        BridgeStatus {
            bridge_active,
            upstream_connected,
            downstream_active,
            net_position,
            hedge_size,
            queue_size,
        }
    }
}
