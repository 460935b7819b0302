//! Per-connection delivery queues.
//!
//! A subscriber is split in two halves:
//!
//! - [`Subscriber`] is the producer handle. It is cheap to clone, lives in
//!   the [`SubscriberRegistry`](crate::broadcast::SubscriberRegistry), and
//!   [`put`](Subscriber::put) never blocks.
//! - [`SubscriberQueue`] is the consumer half owned by the connection's
//!   outbound flow. [`get`](SubscriberQueue::get) suspends until a
//!   notification arrives, with no timeout.
//!
//! The queue is unbounded unless a `max_pending` limit is configured. With
//! a limit, a put that would exceed it is dropped, the subscriber is marked
//! overflowed, and the consumer's next `get` fails so its session can
//! disconnect.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::record::Notification;

/// Unique identifier of a connected subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub Uuid);

impl SubscriberId {
    /// Create a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a single [`Subscriber::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The notification was appended to the queue.
    Queued,
    /// The consumer half is gone; the notification was discarded.
    Closed,
    /// The pending limit was hit; the notification was discarded.
    Overflowed,
}

/// Errors returned by [`SubscriberQueue::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Every producer handle was dropped.
    #[error("subscriber queue closed")]
    Closed,
    /// The subscriber exceeded its pending limit.
    #[error("subscriber queue overflowed")]
    Overflowed,
}

#[derive(Debug)]
struct Counters {
    max_pending: Option<NonZeroUsize>,
    pending: AtomicUsize,
    enqueued: AtomicU64,
    overflowed: AtomicBool,
}

/// Producer half of a subscriber's queue.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::UnboundedSender<Notification>,
    counters: Arc<Counters>,
}

/// Consumer half of a subscriber's queue.
#[derive(Debug)]
pub struct SubscriberQueue {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Notification>,
    counters: Arc<Counters>,
}

impl Subscriber {
    /// Create a subscriber and its queue. `None` means unbounded.
    pub fn new(max_pending: Option<NonZeroUsize>) -> (Self, SubscriberQueue) {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters {
            max_pending,
            pending: AtomicUsize::new(0),
            enqueued: AtomicU64::new(0),
            overflowed: AtomicBool::new(false),
        });
        let subscriber = Self {
            id,
            tx,
            counters: Arc::clone(&counters),
        };
        (subscriber, SubscriberQueue { id, rx, counters })
    }

    /// This subscriber's identifier.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Append a notification without blocking.
    pub fn put(&self, notification: Notification) -> Delivery {
        if self.counters.overflowed.load(Ordering::Acquire) {
            return Delivery::Overflowed;
        }

        // Reserve a slot before sending so the consumer never decrements
        // below zero.
        let reserved = self
            .counters
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                match self.counters.max_pending {
                    Some(limit) if pending >= limit.get() => None,
                    _ => pending.checked_add(1),
                }
            });
        if reserved.is_err() {
            self.counters.overflowed.store(true, Ordering::Release);
            return Delivery::Overflowed;
        }

        if self.tx.send(notification).is_ok() {
            self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            Delivery::Queued
        } else {
            self.counters.pending.fetch_sub(1, Ordering::AcqRel);
            Delivery::Closed
        }
    }

    /// Notifications queued but not yet taken by the consumer.
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }

    /// Lifetime count of successful puts.
    pub fn enqueued_total(&self) -> u64 {
        self.counters.enqueued.load(Ordering::Relaxed)
    }

    /// Whether the pending limit was ever exceeded.
    pub fn is_overflowed(&self) -> bool {
        self.counters.overflowed.load(Ordering::Acquire)
    }

    /// Whether the consumer half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl SubscriberQueue {
    /// Identifier of the owning subscriber.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the oldest pending notification.
    ///
    /// # Errors
    ///
    /// [`QueueError::Overflowed`] once the pending limit has been exceeded,
    /// [`QueueError::Closed`] when no producer handle remains.
    pub async fn get(&mut self) -> Result<Notification, QueueError> {
        if self.counters.overflowed.load(Ordering::Acquire) {
            return Err(QueueError::Overflowed);
        }
        let notification = self.rx.recv().await.ok_or(QueueError::Closed)?;
        self.counters.pending.fetch_sub(1, Ordering::AcqRel);
        Ok(notification)
    }

    /// Same as [`Subscriber::pending`].
    pub fn pending(&self) -> usize {
        self.counters.pending.load(Ordering::Acquire)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    fn note(entity: &str, n: i64) -> Notification {
        Notification::new(entity, json!({"n": n}))
    }

    #[tokio::test]
    async fn fifo_order() {
        let (sub, mut queue) = Subscriber::new(None);
        for i in 0..5 {
            assert_eq!(sub.put(note("a", i)), Delivery::Queued);
        }
        assert_eq!(sub.pending(), 5);
        for i in 0..5 {
            assert_eq!(queue.get().await.unwrap(), note("a", i));
        }
        assert_eq!(queue.pending(), 0);
        assert_eq!(sub.enqueued_total(), 5);
    }

    #[tokio::test]
    async fn get_waits_for_data() {
        let (sub, mut queue) = Subscriber::new(None);
        let waiter = tokio::spawn(async move { queue.get().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        sub.put(note("late", 1));
        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, Ok(note("late", 1)));
    }

    #[tokio::test]
    async fn many_producers_lose_nothing() {
        let (sub, mut queue) = Subscriber::new(None);
        let mut handles = Vec::new();
        for p in 0..8 {
            let sub = sub.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    sub.put(note(&format!("p{p}"), i));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let mut received = 0;
        while queue.pending() > 0 {
            queue.get().await.unwrap();
            received += 1;
        }
        assert_eq!(received, 400);
    }

    #[tokio::test]
    async fn put_after_consumer_dropped_is_closed() {
        let (sub, queue) = Subscriber::new(None);
        drop(queue);
        assert!(sub.is_closed());
        assert_eq!(sub.put(note("a", 1)), Delivery::Closed);
        assert_eq!(sub.pending(), 0);
        assert_eq!(sub.enqueued_total(), 0);
    }

    #[tokio::test]
    async fn get_after_producers_dropped_is_closed() {
        let (sub, mut queue) = Subscriber::new(None);
        sub.put(note("a", 1));
        drop(sub);
        assert_eq!(queue.get().await, Ok(note("a", 1)));
        assert_eq!(queue.get().await, Err(QueueError::Closed));
    }

    #[tokio::test]
    async fn bounded_queue_overflows() {
        let (sub, mut queue) = Subscriber::new(NonZeroUsize::new(2));
        assert_eq!(sub.put(note("a", 1)), Delivery::Queued);
        assert_eq!(sub.put(note("a", 2)), Delivery::Queued);
        assert_eq!(sub.put(note("a", 3)), Delivery::Overflowed);
        assert!(sub.is_overflowed());

        // Once overflowed the subscriber stays overflowed.
        assert_eq!(queue.get().await, Err(QueueError::Overflowed));
        assert_eq!(sub.put(note("a", 4)), Delivery::Overflowed);
        assert_eq!(sub.enqueued_total(), 2);
    }

    #[test]
    fn ids_are_unique() {
        let (a, _qa) = Subscriber::new(None);
        let (b, _qb) = Subscriber::new(None);
        assert_ne!(a.id(), b.id());
    }
}
