//! Local trade bridge between an upstream trading client and a
//! downstream hedge executor.
//!
//! The bridge accepts trade events from the upstream platform, keeps a
//! net-position ledger with a derived hedge size, queues orders for the
//! downstream executor to poll, and routes hedge-closure notifications in
//! both directions. Downstream confirmations are forwarded upstream with
//! retry, upstream closure requests become synthetic queue entries.
//! Liveness of both peers is tracked through a ping/activity model.
//!
//! ## Modules
//!
//! - `config`: file/env/CLI configuration
//! - `types`: wire types for both peers
//! - `queue`: bounded FIFO between intake and delivery
//! - `ledger`: net-position accounting
//! - `liveness`: per-peer activity tracking
//! - `events`: UI event sink capability
//! - `state`: the consolidated application state
//! - `upstream`: egress client with retry for the upstream addon
//! - `handlers` / `server`: the HTTP surface
//! - `reconnect`: listener restart and peer probing

pub mod config;
pub mod events;
pub mod handlers;
pub mod ledger;
pub mod liveness;
pub mod queue;
pub mod reconnect;
pub mod server;
pub mod state;
pub mod types;
pub mod upstream;

pub use config::{BridgeConfig, UpstreamConfig};
pub use events::{
    ChannelEventSink, NullEventSink, RecordingEventSink, UiEvent, UiEventSink,
    DEFAULT_EVENT_CAPACITY,
};
pub use ledger::Ledger;
pub use liveness::{spawn_upstream_sweep, PING_FRESHNESS, SWEEP_INTERVAL};
pub use queue::{QueueFull, TradeQueue, DEFAULT_QUEUE_CAPACITY};
pub use reconnect::{PeerAttempt, ReconnectCoordinator, ReconnectReport};
pub use server::{router, start, ServerHandle};
pub use state::{BridgeState, BridgeStatus, SharedBridgeState};
pub use types::{
    ClosedHedgeAction, HedgeCloseNotification, Mt5TradeResult, NotificationError, OrderKind,
    Trade, TradeAction, TradeDelivery, TradeOutcome, HEDGE_CLOSE_EVENT,
};
pub use upstream::{ForwardError, ForwardReceipt, UpstreamClient};
