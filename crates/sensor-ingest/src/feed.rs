//! Delivery layer between an ingest worker and network consumers.
//!
//! A [`Feed`] is published to by exactly one worker. Consumers drain it
//! through a per-connection [`Subscription`]:
//!
//! - [`Delivery::Exclusive`] shares one destructive [`FreshnessBuffer`], so a
//!   sample reaches at most one consumer across all subscriptions.
//! - [`Delivery::Broadcast`] keeps a current-value slot; each subscription
//!   tracks the last version it saw and receives every fresh sample once.

use std::{fmt, str::FromStr, sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::freshness::{FreshnessBuffer, PublishOutcome};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Delivery {
    #[default]
    Exclusive,
    Broadcast,
}

impl Delivery {
    pub fn label(self) -> &'static str {
        match self {
            Delivery::Exclusive => "exclusive",
            Delivery::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Delivery {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "exclusive" => Ok(Delivery::Exclusive),
            "broadcast" => Ok(Delivery::Broadcast),
            other => Err(format!(
                "unknown delivery mode {other:?} (expected exclusive or broadcast)"
            )),
        }
    }
}

enum Slot<T> {
    Exclusive(FreshnessBuffer<T>),
    Broadcast(watch::Sender<Option<T>>),
}

pub struct Feed<T> {
    name: &'static str,
    slot: Slot<T>,
}

impl<T: Clone + Send + Sync + 'static> Feed<T> {
    pub fn new(name: &'static str, delivery: Delivery) -> Arc<Self> {
        let slot = match delivery {
            Delivery::Exclusive => Slot::Exclusive(FreshnessBuffer::new()),
            Delivery::Broadcast => Slot::Broadcast(watch::Sender::new(None)),
        };
        Arc::new(Self { name, slot })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn delivery(&self) -> Delivery {
        match self.slot {
            Slot::Exclusive(_) => Delivery::Exclusive,
            Slot::Broadcast(_) => Delivery::Broadcast,
        }
    }

    /// Non-blocking publish; overwrites whatever is pending.
    pub fn publish(&self, item: T) -> PublishOutcome {
        match &self.slot {
            Slot::Exclusive(buffer) => buffer.publish(item),
            Slot::Broadcast(sender) => match sender.send_replace(Some(item)) {
                Some(_) => PublishOutcome::Replaced,
                None => PublishOutcome::Stored,
            },
        }
    }

    /// 0 or 1: whether a sample is available without consuming it.
    pub fn pending(&self) -> usize {
        match &self.slot {
            Slot::Exclusive(buffer) => buffer.pending(),
            Slot::Broadcast(sender) => usize::from(sender.borrow().is_some()),
        }
    }

    /// Open a consumer cursor. In broadcast mode the current sample, if any,
    /// counts as unseen.
    pub fn subscribe(self: &Arc<Self>) -> Subscription<T> {
        let cursor = match &self.slot {
            Slot::Exclusive(_) => None,
            Slot::Broadcast(sender) => {
                let mut rx = sender.subscribe();
                if rx.borrow().is_some() {
                    rx.mark_changed();
                }
                Some(rx)
            }
        };
        Subscription {
            feed: self.clone(),
            cursor,
        }
    }
}

/// Per-connection read handle on a [`Feed`].
pub struct Subscription<T> {
    feed: Arc<Feed<T>>,
    cursor: Option<watch::Receiver<Option<T>>>,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    pub fn feed(&self) -> &Arc<Feed<T>> {
        &self.feed
    }

    /// Wait up to `timeout` for a sample this subscription has not yet seen.
    pub async fn next_within(&mut self, timeout: Duration) -> Option<T> {
        match (&self.feed.slot, self.cursor.as_mut()) {
            (Slot::Broadcast(_), Some(rx)) => {
                let deadline = tokio::time::Instant::now() + timeout;
                loop {
                    match tokio::time::timeout_at(deadline, rx.changed()).await {
                        Ok(Ok(())) => {
                            if let Some(item) = rx.borrow_and_update().clone() {
                                return Some(item);
                            }
                        }
                        Ok(Err(_)) | Err(_) => return None,
                    }
                }
            }
            (Slot::Exclusive(buffer), _) => buffer.take_within(timeout).await,
            (Slot::Broadcast(_), None) => None,
        }
    }
}
