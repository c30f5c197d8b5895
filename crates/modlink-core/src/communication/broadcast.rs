//! One-to-many broadcast communications.
//!
//! Subscribers are kept in subscription order and invoked synchronously on
//! the broadcasting thread. Fan-out snapshots the subscriber list before
//! invoking anything, so a subscription added or cancelled mid-broadcast can
//! never corrupt the iteration: a racing cancellation may still observe the
//! in-flight broadcast, never a later one.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use super::value::Value;

/// Handler invoked with the broadcast payload.
pub type BroadcastHandler = Box<dyn Fn(&[Value]) + Send + Sync>;

/// A single subscriber's registration with a broadcaster.
pub struct Subscription {
    handler: BroadcastHandler,
    subscribed: AtomicBool,
    broadcast: Weak<BroadcastCommunication>,
}

impl Subscription {
    /// Whether this subscription is still live.
    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::SeqCst)
    }

    /// Remove this subscription from its broadcaster.
    ///
    /// After this returns, no subsequent broadcast will invoke the handler.
    pub fn unsubscribe(&self) {
        self.subscribed.store(false, Ordering::SeqCst);
        if let Some(broadcast) = self.broadcast.upgrade() {
            broadcast.remove(self);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("subscribed", &self.is_subscribed())
            .finish_non_exhaustive()
    }
}

/// A broadcast entry: an ordered subscriber list, no history of past sends.
#[derive(Default)]
pub struct BroadcastCommunication {
    subscribers: Mutex<Vec<Arc<Subscription>>>,
}

impl BroadcastCommunication {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber and hand back its cancellation handle.
    pub fn subscribe(
        self: &Arc<Self>,
        handler: impl Fn(&[Value]) + Send + Sync + 'static,
    ) -> Arc<Subscription> {
        let subscription = Arc::new(Subscription {
            handler: Box::new(handler),
            subscribed: AtomicBool::new(true),
            broadcast: Arc::downgrade(self),
        });
        self.subscribers.lock().push(subscription.clone());
        subscription
    }

    /// Invoke every current subscriber in subscription order.
    pub fn broadcast(&self, args: &[Value]) {
        let snapshot: Vec<Arc<Subscription>> = self.subscribers.lock().clone();
        for subscription in snapshot {
            if subscription.is_subscribed() {
                (subscription.handler)(args);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    fn remove(&self, subscription: &Subscription) {
        self.subscribers
            .lock()
            .retain(|s| !std::ptr::eq(Arc::as_ptr(s), subscription));
    }
}

impl std::fmt::Debug for BroadcastCommunication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastCommunication")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned to whoever registered the broadcaster.
///
/// The broadcast trigger stays reachable through the registry entry, so the
/// handle is freely cloneable.
#[derive(Clone, Debug)]
pub struct Broadcaster {
    inner: Arc<BroadcastCommunication>,
}

impl Broadcaster {
    pub(crate) fn new(inner: Arc<BroadcastCommunication>) -> Self {
        Self { inner }
    }

    /// Deliver `args` to every current subscriber, on the calling thread.
    pub fn broadcast(&self, args: &[Value]) {
        self.inner.broadcast(args);
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscriber_count()
    }
}
