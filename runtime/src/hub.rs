//! Notification hub: best-effort fan-out of lifecycle events.
//!
//! Maintains a mapping from request id to the set of currently-open
//! subscriber channels. Every successful lifecycle transition publishes a
//! [`RequestEvent`] frame to every subscriber of that request id.
//!
//! Delivery guarantees, or rather the deliberate lack of them:
//!
//! - Best effort: a closed channel is pruned, never retried, and never
//!   blocks or fails delivery to other subscribers
//! - Publish failures never roll back the state transition that triggered
//!   them (publication happens strictly after the transition commits)
//! - Channels are unbounded, so a slow reader cannot block the publisher;
//!   there is no cap on subscriber count
//!
//! Late subscribers are caught up through [`NotificationHub::catch_up`]:
//! the engine registers the channel first, reads the request, and delivers
//! the terminal snapshot when the status is terminal. Each channel records
//! whether a terminal frame already reached it, so a publish racing the
//! registration and the catch-up together deliver exactly one terminal
//! frame, never zero and never two.

use hxp_core::request::RequestEvent;
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

use crate::metrics::{NOTIFICATIONS_DELIVERED, SUBSCRIPTIONS_OPEN};

/// A live subscription to one request's lifecycle events.
///
/// Wraps the receiving half of an unbounded channel; dropping the
/// subscription closes the channel and the hub prunes the sender on the
/// next publish.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::UnboundedReceiver<RequestEvent>,
}

impl Subscription {
    /// Receive the next event frame, or `None` once the channel closes.
    pub async fn recv(&mut self) -> Option<RequestEvent> {
        self.receiver.recv().await
    }

    /// Non-blocking receive, for drains in tests and polling callers.
    ///
    /// # Errors
    ///
    /// Returns [`mpsc::error::TryRecvError`] when no event is queued or the
    /// channel is closed.
    pub fn try_recv(&mut self) -> Result<RequestEvent, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

/// Sending half of one subscriber channel, with its terminal-frame marker.
#[derive(Debug)]
struct Channel {
    id: u64,
    sender: mpsc::UnboundedSender<RequestEvent>,
    /// Set once a terminal frame reached this channel, through publish or
    /// catch-up. A channel never receives a second terminal frame.
    terminal_sent: bool,
}

/// Pub/sub fan-out keyed by request id.
#[derive(Debug, Default)]
pub struct NotificationHub {
    subscribers: Mutex<HashMap<String, Vec<Channel>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber channel for a request id.
    ///
    /// Registration is synchronous and takes effect before this returns:
    /// any event published afterwards reaches the new channel. Terminal
    /// catch-up for late subscribers is a separate, subsequent
    /// [`catch_up`](Self::catch_up) call.
    #[must_use]
    pub fn subscribe(&self, request_id: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut subscribers = self.guard();
        subscribers
            .entry(request_id.to_string())
            .or_default()
            .push(Channel {
                id,
                sender,
                terminal_sent: false,
            });
        let open: usize = subscribers.values().map(Vec::len).sum();
        gauge!(SUBSCRIPTIONS_OPEN).set(open as f64);
        Subscription { id, receiver }
    }

    /// Remove a subscriber channel without waiting for publish-time pruning.
    pub fn unsubscribe(&self, request_id: &str, subscription: &Subscription) {
        let mut subscribers = self.guard();
        if let Some(channels) = subscribers.get_mut(request_id) {
            channels.retain(|channel| channel.id != subscription.id);
            if channels.is_empty() {
                subscribers.remove(request_id);
            }
        }
        let open: usize = subscribers.values().map(Vec::len).sum();
        gauge!(SUBSCRIPTIONS_OPEN).set(open as f64);
    }

    /// Deliver a terminal snapshot to one late subscriber.
    ///
    /// Suppressed when a terminal frame already reached the channel through
    /// a publish that raced the registration; returns whether the snapshot
    /// was actually sent.
    pub fn catch_up(
        &self,
        request_id: &str,
        subscription: &Subscription,
        snapshot: RequestEvent,
    ) -> bool {
        let mut subscribers = self.guard();
        let Some(channel) = subscribers
            .get_mut(request_id)
            .and_then(|channels| channels.iter_mut().find(|c| c.id == subscription.id))
        else {
            return false;
        };
        if channel.terminal_sent {
            return false;
        }
        channel.terminal_sent = true;
        // The subscriber holds the receiver, so this cannot fail.
        let delivered = channel.sender.send(snapshot).is_ok();
        if delivered {
            counter!(NOTIFICATIONS_DELIVERED).increment(1);
        }
        delivered
    }

    /// Publish an event to every open subscriber of a request id.
    ///
    /// Returns the number of subscribers the event was delivered to. Closed
    /// channels are pruned; per-subscriber failures are isolated. Channels
    /// that already received a terminal frame via catch-up are skipped for
    /// terminal events.
    pub fn publish(&self, request_id: &str, event: &RequestEvent) -> usize {
        let terminal = event.event.is_terminal();
        let mut subscribers = self.guard();
        let Some(channels) = subscribers.get_mut(request_id) else {
            return 0;
        };

        let mut delivered = 0;
        channels.retain_mut(|channel| {
            if terminal && channel.terminal_sent {
                return true;
            }
            match channel.sender.send(event.clone()) {
                Ok(()) => {
                    delivered += 1;
                    if terminal {
                        channel.terminal_sent = true;
                    }
                    true
                }
                // Send only fails when the receiver is gone; drop the channel.
                Err(_) => false,
            }
        });
        if channels.is_empty() {
            subscribers.remove(request_id);
        }

        counter!(NOTIFICATIONS_DELIVERED).increment(delivered as u64);
        tracing::debug!(
            request_id,
            event = %event.event,
            delivered,
            "published lifecycle event"
        );
        delivered
    }

    /// Number of open subscriber channels for a request id.
    #[must_use]
    pub fn subscriber_count(&self, request_id: &str) -> usize {
        self.guard().get(request_id).map_or(0, Vec::len)
    }

    fn guard(&self) -> MutexGuard<'_, HashMap<String, Vec<Channel>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

    use super::*;
    use hxp_core::request::Status;

    fn event(status: Status) -> RequestEvent {
        RequestEvent {
            event: status,
            receipt: None,
        }
    }

    #[tokio::test]
    async fn delivers_to_all_subscribers() {
        let hub = NotificationHub::new();
        let mut first = hub.subscribe("r-1");
        let mut second = hub.subscribe("r-1");

        assert_eq!(hub.publish("r-1", &event(Status::Cancelled)), 2);
        assert_eq!(first.recv().await.unwrap().event, Status::Cancelled);
        assert_eq!(second.recv().await.unwrap().event, Status::Cancelled);
    }

    #[tokio::test]
    async fn closed_channels_are_pruned_without_affecting_others() {
        let hub = NotificationHub::new();
        let dropped = hub.subscribe("r-1");
        let mut live = hub.subscribe("r-1");
        drop(dropped);

        assert_eq!(hub.publish("r-1", &event(Status::Completed)), 1);
        assert_eq!(live.recv().await.unwrap().event, Status::Completed);
        assert_eq!(hub.subscriber_count("r-1"), 1);
    }

    #[tokio::test]
    async fn catch_up_delivers_exactly_once() {
        let hub = NotificationHub::new();
        let mut subscription = hub.subscribe("r-1");

        assert!(hub.catch_up("r-1", &subscription, event(Status::Completed)));
        assert!(!hub.catch_up("r-1", &subscription, event(Status::Completed)));

        assert_eq!(subscription.try_recv().unwrap().event, Status::Completed);
        assert!(subscription.try_recv().is_err());
    }

    #[tokio::test]
    async fn catch_up_is_suppressed_after_a_terminal_publish() {
        let hub = NotificationHub::new();
        let mut subscription = hub.subscribe("r-1");
        hub.publish("r-1", &event(Status::Completed));

        assert!(!hub.catch_up("r-1", &subscription, event(Status::Completed)));
        assert_eq!(subscription.try_recv().unwrap().event, Status::Completed);
        assert!(subscription.try_recv().is_err());
    }

    #[tokio::test]
    async fn terminal_publish_is_suppressed_after_catch_up() {
        let hub = NotificationHub::new();
        let mut caught_up = hub.subscribe("r-1");
        let mut fresh = hub.subscribe("r-1");
        assert!(hub.catch_up("r-1", &caught_up, event(Status::Expired)));

        // Only the channel without a terminal frame receives the publish.
        assert_eq!(hub.publish("r-1", &event(Status::Expired)), 1);
        assert_eq!(caught_up.try_recv().unwrap().event, Status::Expired);
        assert!(caught_up.try_recv().is_err());
        assert_eq!(fresh.try_recv().unwrap().event, Status::Expired);
    }

    #[tokio::test]
    async fn unsubscribe_removes_the_channel() {
        let hub = NotificationHub::new();
        let subscription = hub.subscribe("r-1");
        assert_eq!(hub.subscriber_count("r-1"), 1);

        hub.unsubscribe("r-1", &subscription);
        assert_eq!(hub.subscriber_count("r-1"), 0);
        assert_eq!(hub.publish("r-1", &event(Status::Cancelled)), 0);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let hub = NotificationHub::new();
        assert_eq!(hub.publish("r-unknown", &event(Status::Expired)), 0);
    }
}
