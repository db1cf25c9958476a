//! Outbound message queue.
//!
//! One FIFO per [`MessageCategory`]. Entries leave the queue only after a
//! successful transmit, so a failure mid-drain leaves the failed entry at the
//! head and everything behind it untouched. Each category is bounded; when
//! full, the oldest entry is evicted.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use maira_core::{LinkError, MessageCategory};
use serde_json::Value;
use tracing::{debug, warn};

/// Default per-category capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// One outbound domain event awaiting delivery.
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedMessage {
    /// Queue the message belongs to.
    pub category: MessageCategory,
    /// Opaque domain payload.
    pub payload: Value,
    /// When it was queued.
    pub enqueued_at: DateTime<Utc>,
}

/// Outcome of a drain pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Messages transmitted and removed.
    pub sent: usize,
    /// Categories whose drain stopped on a transmit failure.
    pub aborted: Vec<MessageCategory>,
    /// Categories whose drain paused because the transport buffer was full.
    pub stalled: Vec<MessageCategory>,
    /// Messages still queued after the pass.
    pub remaining: usize,
}

/// Per-category bounded FIFO buffers.
#[derive(Debug)]
pub struct OutboundQueue {
    queues: BTreeMap<MessageCategory, VecDeque<QueuedMessage>>,
    dropped: BTreeMap<MessageCategory, u64>,
    capacity: usize,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl OutboundQueue {
    /// Create a queue holding at most `capacity` messages per category.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queues: BTreeMap::new(),
            dropped: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Per-category capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, evicting the oldest entries that no longer fit.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        let capacity = self.capacity;
        for (category, queue) in &mut self.queues {
            let excess = queue.len().saturating_sub(capacity);
            if excess > 0 {
                drop(queue.drain(..excess));
                *self.dropped.entry(*category).or_default() += excess as u64;
                warn!(%category, evicted = excess, "outbound queue shrunk, oldest messages dropped");
            }
        }
    }

    /// Append a message. Returns the evicted oldest message if the category was full.
    pub fn enqueue(&mut self, category: MessageCategory, payload: Value) -> Option<QueuedMessage> {
        let queue = self.queues.entry(category).or_default();
        let evicted = if queue.len() >= self.capacity {
            let oldest = queue.pop_front();
            let dropped = self.dropped.entry(category).or_default();
            *dropped += 1;
            warn!(
                %category,
                capacity = self.capacity,
                dropped = *dropped,
                "outbound queue full, dropping oldest message"
            );
            oldest
        } else {
            None
        };
        queue.push_back(QueuedMessage {
            category,
            payload,
            enqueued_at: Utc::now(),
        });
        evicted
    }

    /// Messages queued for a category.
    #[must_use]
    pub fn len(&self, category: MessageCategory) -> usize {
        self.queues.get(&category).map_or(0, VecDeque::len)
    }

    /// Messages queued across all categories.
    #[must_use]
    pub fn total_len(&self) -> usize {
        self.queues.values().map(VecDeque::len).sum()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    /// Messages evicted from a category since creation.
    #[must_use]
    pub fn dropped(&self, category: MessageCategory) -> u64 {
        self.dropped.get(&category).copied().unwrap_or(0)
    }

    /// Queued messages of a category, oldest first.
    pub fn iter(&self, category: MessageCategory) -> impl Iterator<Item = &QueuedMessage> {
        self.queues.get(&category).into_iter().flatten()
    }

    /// Drain one category in FIFO order.
    ///
    /// Each entry is removed only after `transmit` succeeds; the first failure
    /// stops the pass and leaves that entry and the rest in place.
    pub fn drain_category<F>(
        &mut self,
        category: MessageCategory,
        transmit: &mut F,
    ) -> Result<usize, LinkError>
    where
        F: FnMut(&QueuedMessage) -> Result<(), LinkError>,
    {
        let Some(queue) = self.queues.get_mut(&category) else {
            return Ok(0);
        };
        let mut sent = 0;
        while let Some(front) = queue.front() {
            transmit(front)?;
            let _ = queue.pop_front();
            sent += 1;
        }
        Ok(sent)
    }

    /// Drain every category, each independently.
    pub fn drain<F>(&mut self, mut transmit: F) -> DrainReport
    where
        F: FnMut(&QueuedMessage) -> Result<(), LinkError>,
    {
        let mut report = DrainReport::default();
        for category in MessageCategory::ALL {
            let before = self.len(category);
            match self.drain_category(category, &mut transmit) {
                Ok(sent) => report.sent += sent,
                Err(e) if e.is_backpressure() => {
                    let sent = before - self.len(category);
                    report.sent += sent;
                    report.stalled.push(category);
                    debug!(%category, sent, remaining = self.len(category), "drain paused, transport buffer full");
                }
                Err(e) => {
                    let sent = before - self.len(category);
                    report.sent += sent;
                    report.aborted.push(category);
                    warn!(
                        %category,
                        sent,
                        remaining = self.len(category),
                        error = %e,
                        "drain aborted, remaining messages kept for next connection"
                    );
                }
            }
        }
        report.remaining = self.total_len();
        report
    }
}
