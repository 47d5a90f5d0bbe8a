//! Single-slot, drop-oldest handoff between an ingest thread and its consumers.
//!
//! The slot holds at most one pending sample. `publish` swaps the new sample in
//! under a lock held only for the swap, so producers never wait on consumers.
//! Takes are destructive: every published sample is handed to at most one
//! caller, and a caller only ever sees the newest sample at the time it takes.

use std::{
    sync::{
        Condvar, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::sync::Notify;

/// What `publish` did with the previously pending sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The slot was empty.
    Stored,
    /// An unconsumed sample was discarded in favour of the new one.
    Replaced,
}

pub struct FreshnessBuffer<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
    notify: Notify,
    published: AtomicU64,
    replaced: AtomicU64,
}

impl<T> Default for FreshnessBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FreshnessBuffer<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            ready: Condvar::new(),
            notify: Notify::new(),
            published: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
        }
    }

    /// Store `item`, discarding any sample still pending. Never blocks on consumers.
    pub fn publish(&self, item: T) -> PublishOutcome {
        let displaced = self.lock_slot().replace(item);
        self.published.fetch_add(1, Ordering::Relaxed);
        self.ready.notify_one();
        self.notify.notify_one();

        match displaced {
            Some(_) => {
                self.replaced.fetch_add(1, Ordering::Relaxed);
                PublishOutcome::Replaced
            }
            None => PublishOutcome::Stored,
        }
    }

    /// Take the pending sample without waiting.
    pub fn take_now(&self) -> Option<T> {
        self.lock_slot().take()
    }

    /// Block the calling thread up to `timeout` for a sample.
    pub fn try_take(&self, timeout: Duration) -> Option<T> {
        let guard = self.lock_slot();
        let (mut guard, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |slot| slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.take()
    }

    /// Async counterpart of [`try_take`](Self::try_take) for transport tasks.
    ///
    /// Cancelling the returned future never loses a sample: the take itself
    /// happens without an intervening await.
    pub async fn take_within(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.take_now() {
                return Some(item);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.take_now();
            }
        }
    }

    /// Number of pending samples, 0 or 1. Does not consume.
    pub fn pending(&self) -> usize {
        usize::from(self.lock_slot().is_some())
    }

    pub fn published_total(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn replaced_total(&self) -> u64 {
        self.replaced.load(Ordering::Relaxed)
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Barrier},
        thread,
        time::Instant,
    };

    use super::*;

    #[test]
    fn publish_replaces_pending_sample() {
        let buffer = FreshnessBuffer::new();
        assert_eq!(buffer.publish(1), PublishOutcome::Stored);
        assert_eq!(buffer.publish(2), PublishOutcome::Replaced);
        assert_eq!(buffer.publish(3), PublishOutcome::Replaced);

        assert_eq!(buffer.pending(), 1);
        assert_eq!(buffer.take_now(), Some(3));
        assert_eq!(buffer.take_now(), None);
        assert_eq!(buffer.published_total(), 3);
        assert_eq!(buffer.replaced_total(), 2);
    }

    #[test]
    fn try_take_times_out_when_nothing_published() {
        let buffer = FreshnessBuffer::<u32>::new();
        let start = Instant::now();
        assert_eq!(buffer.try_take(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn try_take_wakes_on_publish() {
        let buffer = Arc::new(FreshnessBuffer::new());
        let producer = buffer.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.publish("frame");
        });

        assert_eq!(buffer.try_take(Duration::from_secs(2)), Some("frame"));
        handle.join().unwrap();
    }

    #[test]
    fn publish_never_blocks_without_consumers() {
        let buffer = FreshnessBuffer::new();
        let start = Instant::now();
        for value in 0..100_000u32 {
            buffer.publish(value);
        }
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(buffer.take_now(), Some(99_999));
    }

    #[test]
    fn concurrent_consumers_see_fresh_unique_samples() {
        const SAMPLES: u64 = 20_000;
        let buffer = Arc::new(FreshnessBuffer::new());
        let barrier = Arc::new(Barrier::new(4));

        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let buffer = buffer.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    let mut seen = Vec::new();
                    loop {
                        match buffer.try_take(Duration::from_millis(50)) {
                            Some(u64::MAX) => {
                                buffer.publish(u64::MAX);
                                break;
                            }
                            Some(value) => seen.push(value),
                            None => {}
                        }
                    }
                    seen
                })
            })
            .collect();

        barrier.wait();
        for value in 0..SAMPLES {
            buffer.publish(value);
        }
        buffer.publish(u64::MAX);

        let mut all = HashSet::new();
        for handle in consumers {
            let seen = handle.join().unwrap();
            assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
            for value in seen {
                assert!(all.insert(value), "sample {value} delivered twice");
            }
        }
    }

    #[tokio::test]
    async fn take_within_returns_latest_after_burst() {
        let buffer = Arc::new(FreshnessBuffer::new());
        let producer = buffer.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            for value in 0..5 {
                producer.publish(value);
            }
        });

        let first = buffer.take_within(Duration::from_secs(2)).await;
        assert!(matches!(first, Some(value) if value <= 4));
        // the burst is already in the slot or consumed; nothing older remains
        if let Some(next) = buffer.take_within(Duration::from_millis(20)).await {
            assert!(next > first.unwrap());
        }
    }

    #[tokio::test]
    async fn take_within_times_out() {
        let buffer = FreshnessBuffer::<u8>::new();
        let start = tokio::time::Instant::now();
        assert_eq!(buffer.take_within(Duration::from_millis(30)).await, None);
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[tokio::test]
    async fn stale_notify_permit_does_not_return_early() {
        let buffer = FreshnessBuffer::new();
        buffer.publish(1u8);
        assert_eq!(buffer.take_now(), Some(1));
        // the publish above left a wake permit behind; the wait must still time out
        assert_eq!(buffer.take_within(Duration::from_millis(20)).await, None);
    }
}
