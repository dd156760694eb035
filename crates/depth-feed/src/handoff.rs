//! Bounded handoff between a feed producer and the reconstruction consumer
//!
//! The producer side (network reader, file reader) pushes records; the
//! consumer pops them in arrival order. When the queue is full the
//! configured [`OverflowPolicy`] decides whether the producer waits or a
//! record is discarded. Every discard is counted and logged.

use crate::config::OverflowPolicy;
use depth_types::{DepthError, DepthResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// What happened to a pushed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pushed {
    /// Queued with room to spare
    Queued,
    /// Queued after evicting the oldest record
    DroppedOldest,
    /// Discarded because the queue was full
    DroppedNewest,
}

impl Pushed {
    /// Whether a record was lost on this push
    pub fn lost_record(&self) -> bool {
        !matches!(self, Pushed::Queued)
    }
}

/// Bounded multi-producer, single-consumer queue
#[derive(Debug)]
pub struct Handoff<T> {
    queue: Mutex<VecDeque<T>>,
    capacity: usize,
    policy: OverflowPolicy,
    closed: AtomicBool,
    dropped: AtomicU64,
    readable: Notify,
    writable: Notify,
}

impl<T> Handoff<T> {
    /// Create a handoff; a zero capacity is raised to one
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            policy,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            readable: Notify::new(),
            writable: Notify::new(),
        }
    }

    /// Push without waiting
    ///
    /// Under [`OverflowPolicy::Block`] a full queue hands the record back.
    pub fn try_push(&self, item: T) -> Result<Pushed, T> {
        if self.is_closed() {
            return Err(item);
        }

        let mut queue = self.queue.lock();
        if queue.len() < self.capacity {
            queue.push_back(item);
            drop(queue);
            self.readable.notify_one();
            return Ok(Pushed::Queued);
        }

        match self.policy {
            OverflowPolicy::Block => Err(item),
            OverflowPolicy::DropOldest => {
                queue.pop_front();
                queue.push_back(item);
                drop(queue);
                self.note_drop(Pushed::DroppedOldest);
                self.readable.notify_one();
                Ok(Pushed::DroppedOldest)
            }
            OverflowPolicy::DropNewest => {
                drop(queue);
                self.note_drop(Pushed::DroppedNewest);
                Ok(Pushed::DroppedNewest)
            }
        }
    }

    /// Push, waiting for room under [`OverflowPolicy::Block`]
    ///
    /// Fails with [`DepthError::ChannelClosed`] once the handoff is closed.
    pub async fn push(&self, item: T) -> DepthResult<Pushed> {
        let mut item = item;
        loop {
            let notified = self.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_closed() {
                return Err(DepthError::ChannelClosed);
            }
            match self.try_push(item) {
                Ok(pushed) => return Ok(pushed),
                Err(back) => item = back,
            }

            debug!(capacity = self.capacity, "Handoff full, producer waiting");
            notified.await;
        }
    }

    /// Pop the oldest record, waiting if empty
    ///
    /// Returns `None` once the handoff is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            if self.is_closed() {
                return None;
            }
            notified.await;
        }
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<T> {
        let item = self.queue.lock().pop_front();
        if item.is_some() {
            self.writable.notify_one();
        }
        item
    }

    /// Close the handoff; queued records stay poppable
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(queued = self.len(), "Handoff closed");
        }
        self.readable.notify_waiters();
        self.writable.notify_waiters();
    }

    /// Whether the handoff has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Records currently queued
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Maximum queued records
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Overflow policy in force
    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Records discarded so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn note_drop(&self, pushed: Pushed) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            outcome = ?pushed,
            capacity = self.capacity,
            dropped = total,
            "Handoff overflow, record discarded"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_try_push_block_hands_back() {
        let handoff = Handoff::new(2, OverflowPolicy::Block);
        assert_eq!(handoff.try_push(1), Ok(Pushed::Queued));
        assert_eq!(handoff.try_push(2), Ok(Pushed::Queued));
        assert_eq!(handoff.try_push(3), Err(3));
        assert_eq!(handoff.dropped(), 0);
    }

    #[test]
    fn test_drop_oldest() {
        let handoff = Handoff::new(2, OverflowPolicy::DropOldest);
        handoff.try_push(1).unwrap();
        handoff.try_push(2).unwrap();
        assert_eq!(handoff.try_push(3), Ok(Pushed::DroppedOldest));
        assert_eq!(handoff.try_pop(), Some(2));
        assert_eq!(handoff.try_pop(), Some(3));
        assert_eq!(handoff.dropped(), 1);
    }

    #[test]
    fn test_drop_newest() {
        let handoff = Handoff::new(1, OverflowPolicy::DropNewest);
        handoff.try_push("a").unwrap();
        let pushed = handoff.try_push("b").unwrap();
        assert!(pushed.lost_record());
        assert_eq!(handoff.try_pop(), Some("a"));
        assert_eq!(handoff.try_pop(), None);
        assert_eq!(handoff.dropped(), 1);
    }

    #[tokio::test]
    async fn test_close_drains_then_ends() {
        let handoff = Handoff::new(4, OverflowPolicy::Block);
        handoff.push(1).await.unwrap();
        handoff.push(2).await.unwrap();
        handoff.close();

        assert!(matches!(handoff.push(3).await, Err(DepthError::ChannelClosed)));
        assert_eq!(handoff.pop().await, Some(1));
        assert_eq!(handoff.pop().await, Some(2));
        assert_eq!(handoff.pop().await, None);
    }

    #[tokio::test]
    async fn test_blocked_producer_resumes() {
        let handoff = Arc::new(Handoff::new(1, OverflowPolicy::Block));
        handoff.push(1u32).await.unwrap();

        let producer = {
            let handoff = Arc::clone(&handoff);
            tokio::spawn(async move { handoff.push(2).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!producer.is_finished());

        assert_eq!(handoff.pop().await, Some(1));
        assert_eq!(producer.await.unwrap().unwrap(), Pushed::Queued);
        assert_eq!(handoff.pop().await, Some(2));
    }

    #[tokio::test]
    async fn test_waiting_consumer_wakes_on_close() {
        let handoff = Arc::new(Handoff::<u32>::new(4, OverflowPolicy::Block));
        let consumer = {
            let handoff = Arc::clone(&handoff);
            tokio::spawn(async move { handoff.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        handoff.close();
        assert_eq!(consumer.await.unwrap(), None);
    }
}
