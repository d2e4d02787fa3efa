//! Net-position accounting.
//!
//! The ledger is a signed contract count plus the derived hedge size.
//! Invariant between updates: `hedge_size == net_position as f64`. The
//! bridge-listener flag lives under the same mutex because health
//! snapshots and reconnect reporting read it together with the position.

use crate::types::{OrderKind, Trade, TradeAction};

/// Mutex-governed position state. All mutations re-derive the hedge size.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// Signed sum of executed contracts; positive long, negative short.
    pub net_position: i64,
    /// Intended hedge volume, always `net_position as f64` when quiescent.
    pub hedge_size: f64,
    /// True while the HTTP listener is bound.
    pub bridge_active: bool,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an accepted intake record. TP/SL measurements and synthetic
    /// closures leave the position untouched.
    pub fn apply_trade(&mut self, trade: &Trade) -> bool {
        if trade.order_type.is_measurement() {
            return false;
        }
        let delta = match trade.action {
            TradeAction::Buy => trade.floored_quantity(),
            TradeAction::Sell => -trade.floored_quantity(),
            // Closure records are accounted by the closure router.
            TradeAction::CloseHedge => 0,
        };
        if delta == 0 {
            return false;
        }
        self.net_position += delta;
        self.rederive();
        true
    }

    /// Apply a signed contract delta from an upstream closure.
    pub fn apply_delta(&mut self, delta: i64) {
        self.net_position += delta;
        self.rederive();
    }

    /// Re-assert `hedge_size == net_position as f64`, returning whether a
    /// corrective write was needed.
    pub fn reconcile(&mut self) -> bool {
        let desired = self.net_position as f64;
        if self.hedge_size != desired {
            self.hedge_size = desired;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.net_position = 0;
        self.hedge_size = 0.0;
    }

    pub fn is_flat(&self) -> bool {
        self.net_position == 0 && self.hedge_size == 0.0
    }

    fn rederive(&mut self) {
        self.hedge_size = self.net_position as f64;
    }
}
