//! One-way notifications of state changes to the embedding UI.
//!
//! The bridge core never talks to a UI toolkit directly; it emits typed
//! events through the [`UiEventSink`] capability. Production wires a
//! bounded-channel sink whose receiver is the embedder's attach point,
//! tests wire [`RecordingEventSink`]. Emission is fire-and-forget: a slow
//! or absent consumer drops events, it never blocks a request handler.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity of the channel sink.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// State-change notification for the embedding UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum UiEvent {
    PositionUpdated { net_position: i64, hedge_size: f64 },
    PositionReset { net_position: i64, hedge_size: f64 },
    AddonPingSuccess,
    HedgebotPingSuccess,
    HedgebotStatusChanged { active: bool },
    AddonRetryResult { success: bool, message: String },
}

impl UiEvent {
    /// Event name as the embedding UI knows it.
    pub fn name(&self) -> &'static str {
        match self {
            UiEvent::PositionUpdated { .. } => "positionUpdated",
            UiEvent::PositionReset { .. } => "positionReset",
            UiEvent::AddonPingSuccess => "addonPingSuccess",
            UiEvent::HedgebotPingSuccess => "hedgebotPingSuccess",
            UiEvent::HedgebotStatusChanged { .. } => "hedgebotStatusChanged",
            UiEvent::AddonRetryResult { .. } => "addonRetryResult",
        }
    }
}

/// Capability through which the bridge core notifies the embedding UI.
pub trait UiEventSink: Send + Sync {
    fn emit(&self, event: UiEvent);
}

/// Sink that discards everything. Useful when no UI is attached.
#[derive(Debug, Default)]
pub struct NullEventSink;

impl UiEventSink for NullEventSink {
    fn emit(&self, _event: UiEvent) {}
}

/// Production sink: bounded channel, `try_send`, drops on backpressure.
#[derive(Debug)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<UiEvent>,
    dropped: AtomicU64,
}

impl ChannelEventSink {
    /// Create the sink and the receiver the embedder drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<UiEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    /// Events discarded because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl UiEventSink for ChannelEventSink {
    fn emit(&self, event: UiEvent) {
        if let Err(e) = self.tx.try_send(event) {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(dropped, error = %e, "ui event dropped");
        }
    }
}

/// Test sink that records every emission for later assertion.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<UiEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events with the given name.
    pub fn count_of(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|e| e.name() == name).count()
    }
}

impl UiEventSink for RecordingEventSink {
    fn emit(&self, event: UiEvent) {
        self.events.lock().push(event);
    }
}
