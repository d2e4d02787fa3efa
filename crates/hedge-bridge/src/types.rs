//! Wire types exchanged with the upstream client and the downstream executor.
//!
//! Intake payloads are tolerant: every field except `action` carries a
//! serde default so that partially-filled trade events from the upstream
//! platform still parse. The delivery payload to the downstream executor
//! is a distinct shape (`TradeDelivery`) because the instrument/account
//! keys are renamed on that leg.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The only accepted `event_type` for closure notifications, in either
/// direction.
pub const HEDGE_CLOSE_EVENT: &str = "hedge_close_notification";

/// Semantic direction of a trade record.
///
/// `CloseHedge` is synthesised internally by the closure router; the
/// upstream client only ever sends `Buy`/`Sell`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Buy,
    Sell,
    #[serde(rename = "CLOSE_HEDGE")]
    CloseHedge,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "Buy"),
            TradeAction::Sell => write!(f, "Sell"),
            TradeAction::CloseHedge => write!(f, "CLOSE_HEDGE"),
        }
    }
}

/// Role of a trade record within its base group.
///
/// `TakeProfit`/`StopLoss` records carry measurements and never touch the
/// position ledger; `NtClose` marks the synthetic closure records produced
/// by the closure router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OrderKind {
    #[default]
    #[serde(rename = "")]
    Unspecified,
    #[serde(rename = "ENTRY")]
    Entry,
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "NT_CLOSE")]
    NtClose,
}

impl OrderKind {
    /// TP/SL records pass through the queue without ledger updates.
    pub fn is_measurement(self) -> bool {
        matches!(self, OrderKind::TakeProfit | OrderKind::StopLoss)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderKind::Unspecified => "",
            OrderKind::Entry => "ENTRY",
            OrderKind::TakeProfit => "TP",
            OrderKind::StopLoss => "SL",
            OrderKind::NtClose => "NT_CLOSE",
        };
        write!(f, "{}", s)
    }
}

/// Outcome reported in the upstream performance snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
    Pending,
}

/// A single contract event from the upstream client.
///
/// `instrument`/`account` deserialize from the upstream keys
/// `instrument_name`/`account_name` and are opaque passthrough values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub base_id: String,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    pub action: TradeAction,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub total_quantity: i64,
    #[serde(default)]
    pub contract_num: i64,
    #[serde(default)]
    pub order_type: OrderKind,
    #[serde(default)]
    pub measurement_pips: i64,
    #[serde(default)]
    pub raw_measurement: f64,
    #[serde(default, rename = "instrument_name")]
    pub instrument: String,
    #[serde(default, rename = "account_name")]
    pub account: String,

    // Upstream performance snapshot, passed through for elastic hedging.
    #[serde(default)]
    pub nt_balance: f64,
    #[serde(default)]
    pub nt_daily_pnl: f64,
    #[serde(default)]
    pub nt_trade_result: Option<TradeOutcome>,
    #[serde(default)]
    pub nt_session_trades: i64,
}

impl Trade {
    /// Contract count as the ledger sees it. Fractional quantities are
    /// floored on ingest; the queued record keeps the exact value.
    pub fn floored_quantity(&self) -> i64 {
        self.quantity.floor() as i64
    }

    /// Fill the event time with `now` when it is absent or the zero value.
    pub fn fill_missing_time(&mut self, now: DateTime<Utc>) {
        if self.time.map_or(true, |t| t.timestamp() <= 0) {
            self.time = Some(now);
        }
    }

    /// Build the synthetic queue record that tells the downstream executor
    /// to close a hedge, in response to an upstream closure request.
    pub fn synthetic_closure(notification: &HedgeCloseNotification, now: DateTime<Utc>) -> Self {
        Trade {
            id: format!("nt_close_{}_{}", notification.base_id, now.timestamp()),
            base_id: notification.base_id.clone(),
            time: Some(now),
            action: TradeAction::CloseHedge,
            quantity: notification.closed_hedge_quantity,
            price: 0.0,
            total_quantity: notification.closed_hedge_quantity.floor() as i64,
            contract_num: 1,
            order_type: OrderKind::NtClose,
            measurement_pips: 0,
            raw_measurement: 0.0,
            instrument: notification.nt_instrument_symbol.clone(),
            account: notification.nt_account_name.clone(),
            nt_balance: 0.0,
            nt_daily_pnl: 0.0,
            nt_trade_result: None,
            nt_session_trades: 0,
        }
    }
}

/// Flat JSON object served to the downstream executor on a queue hit.
///
/// Same fields as [`Trade`], but the instrument/account keys are renamed
/// to the names the executor expects.
#[derive(Debug, Serialize)]
pub struct TradeDelivery<'a> {
    pub id: &'a str,
    pub base_id: &'a str,
    pub time: Option<DateTime<Utc>>,
    pub action: TradeAction,
    pub quantity: f64,
    pub price: f64,
    pub total_quantity: i64,
    pub contract_num: i64,
    pub order_type: OrderKind,
    pub measurement_pips: i64,
    pub raw_measurement: f64,
    pub nt_instrument_symbol: &'a str,
    pub nt_account_name: &'a str,
    pub nt_balance: f64,
    pub nt_daily_pnl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nt_trade_result: Option<TradeOutcome>,
    pub nt_session_trades: i64,
}

impl<'a> From<&'a Trade> for TradeDelivery<'a> {
    fn from(trade: &'a Trade) -> Self {
        TradeDelivery {
            id: &trade.id,
            base_id: &trade.base_id,
            time: trade.time,
            action: trade.action,
            quantity: trade.quantity,
            price: trade.price,
            total_quantity: trade.total_quantity,
            contract_num: trade.contract_num,
            order_type: trade.order_type,
            measurement_pips: trade.measurement_pips,
            raw_measurement: trade.raw_measurement,
            nt_instrument_symbol: &trade.instrument,
            nt_account_name: &trade.account,
            nt_balance: trade.nt_balance,
            nt_daily_pnl: trade.nt_daily_pnl,
            nt_trade_result: trade.nt_trade_result,
            nt_session_trades: trade.nt_session_trades,
        }
    }
}

/// Signed intent carried by an upstream closure request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClosedHedgeAction {
    Sell,
    Buy,
    BuyToCover,
}

impl ClosedHedgeAction {
    /// Ledger delta sign: selling closes long exposure, buying (or buying
    /// to cover) closes short exposure.
    pub fn signed(self, contracts: i64) -> i64 {
        match self {
            ClosedHedgeAction::Sell => -contracts,
            ClosedHedgeAction::Buy | ClosedHedgeAction::BuyToCover => contracts,
        }
    }
}

/// Hedge-closure notification, exchanged in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeCloseNotification {
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub base_id: String,
    #[serde(default)]
    pub nt_instrument_symbol: String,
    #[serde(default)]
    pub nt_account_name: String,
    #[serde(default)]
    pub closed_hedge_quantity: f64,
    #[serde(default)]
    pub closed_hedge_action: Option<ClosedHedgeAction>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub closure_reason: String,
}

/// Validation failures for closure notifications.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("invalid notification type '{0}', expected '{HEDGE_CLOSE_EVENT}'")]
    InvalidEventType(String),

    #[error("missing base_id")]
    MissingBaseId,
}

impl HedgeCloseNotification {
    /// Check the fields every closure notification must carry.
    pub fn validate(&self) -> Result<(), NotificationError> {
        if self.event_type != HEDGE_CLOSE_EVENT {
            return Err(NotificationError::InvalidEventType(self.event_type.clone()));
        }
        if self.base_id.is_empty() {
            return Err(NotificationError::MissingBaseId);
        }
        Ok(())
    }

    /// Contract count for the ledger, floored like trade quantities.
    pub fn floored_quantity(&self) -> i64 {
        self.closed_hedge_quantity.floor() as i64
    }
}

/// Execution result reported by the downstream executor. Acknowledged and
/// logged, never acted on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mt5TradeResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub ticket: u64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub is_close: bool,
    #[serde(default)]
    pub id: String,
}
