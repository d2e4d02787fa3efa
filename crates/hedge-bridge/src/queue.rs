//! Bounded FIFO of pending orders for the downstream executor.
//!
//! The queue is the only ordering primitive between intake and delivery:
//! no priority, no reordering, no coalescing. Both ends are non-blocking;
//! a full queue rejects the put and the caller surfaces it as 503, an
//! empty queue is the `no_trade` sentinel rather than an error.

use std::collections::VecDeque;

use parking_lot::Mutex;
use thiserror::Error;

use crate::types::Trade;

/// Capacity the bridge runs with unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Rejected put: the queue is at capacity. Never dropped silently.
#[derive(Debug, Error)]
#[error("trade queue at capacity ({capacity})")]
pub struct QueueFull {
    pub capacity: usize,
}

/// FIFO buffer of trades awaiting a downstream pull.
#[derive(Debug)]
pub struct TradeQueue {
    inner: Mutex<VecDeque<Trade>>,
    capacity: usize,
}

impl TradeQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Non-blocking put. Fails with [`QueueFull`] instead of evicting.
    pub fn push(&self, trade: Trade) -> Result<(), QueueFull> {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            return Err(QueueFull {
                capacity: self.capacity,
            });
        }
        inner.push_back(trade);
        Ok(())
    }

    /// Non-blocking take in arrival order.
    pub fn pop(&self) -> Option<Trade> {
        self.inner.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for TradeQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
