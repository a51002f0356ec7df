//! Subscriber registry and best-effort fan-out
//!
//! Each subscriber owns a bounded channel. Broadcasting uses `try_send`, so a
//! full or abandoned channel costs the producer nothing: the record is simply
//! dropped for that subscriber and the outcome is reported as a [`Delivery`].

use std::fmt;
use std::ops::AddAssign;

use tokio::sync::mpsc;
use uuid::Uuid;

/// Default per-subscriber queue capacity
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 1024;

/// Identifier of a registered subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outcome of offering one record to one subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The record was queued
    Delivered,
    /// The subscriber's queue was at capacity
    DroppedFull,
    /// The subscriber's receiving half is gone
    DroppedClosed,
}

/// Aggregated outcomes of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub delivered: usize,
    pub dropped_full: usize,
    pub dropped_closed: usize,
}

impl BroadcastSummary {
    fn record(&mut self, delivery: Delivery) {
        match delivery {
            Delivery::Delivered => self.delivered += 1,
            Delivery::DroppedFull => self.dropped_full += 1,
            Delivery::DroppedClosed => self.dropped_closed += 1,
        }
    }

    /// Total number of records that did not reach a subscriber
    pub fn dropped(&self) -> usize {
        self.dropped_full + self.dropped_closed
    }
}

impl AddAssign for BroadcastSummary {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.dropped_full += other.dropped_full;
        self.dropped_closed += other.dropped_closed;
    }
}

/// Receiving side of a subscriber channel
///
/// Dropping a `Subscription` without unsubscribing is tolerated: the next
/// broadcast sees the closed channel and prunes it.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<String>,
}

impl Subscription {
    /// Identifier to pass to `unsubscribe`
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next record
    ///
    /// Returns `None` once the subscriber has been unsubscribed and every
    /// record queued before that has been received.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Take a record if one is queued, without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        self.receiver.try_recv().ok()
    }

    /// Blocking variant of [`recv`](Self::recv) for plain threads
    ///
    /// Panics if called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<String> {
        self.receiver.blocking_recv()
    }
}

/// Ordered set of subscriber channels
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    senders: Vec<(SubscriberId, mpsc::Sender<String>)>,
}

impl SubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new channel with room for `capacity` records
    pub fn subscribe(&mut self, capacity: usize) -> Subscription {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let id = SubscriberId::new();
        self.senders.push((id, sender));
        Subscription { id, receiver }
    }

    /// Remove a channel; returns false if it was not registered
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.senders.len();
        self.senders.retain(|(existing, _)| *existing != id);
        self.senders.len() != before
    }

    /// Offer `record` to every subscriber without waiting
    ///
    /// Subscribers whose receiver has been dropped are removed after the pass.
    pub fn broadcast(&mut self, record: &str) -> BroadcastSummary {
        let mut summary = BroadcastSummary::default();
        for (_, sender) in &self.senders {
            summary.record(offer(sender, record));
        }
        if summary.dropped_closed > 0 {
            self.senders.retain(|(_, sender)| !sender.is_closed());
        }
        summary
    }

    /// Number of registered subscribers
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Whether no subscriber is registered
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

/// Non-blocking send of a single record
pub fn offer(sender: &mpsc::Sender<String>, record: &str) -> Delivery {
    match sender.try_send(record.to_owned()) {
        Ok(()) => Delivery::Delivered,
        Err(mpsc::error::TrySendError::Full(_)) => Delivery::DroppedFull,
        Err(mpsc::error::TrySendError::Closed(_)) => Delivery::DroppedClosed,
    }
}
