//! Lifecycle event bus
//!
//! Process-wide publish/subscribe surface the kernel uses to announce
//! `initialized`, `reload-start`, `reload-complete` and `error`. Modules
//! subscribe from their entry points; the kernel drops every subscriber
//! before a fresh full load so subscriptions are re-established by the
//! modules themselves.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::module::traits::ModuleError;

/// Named lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Initialized,
    ReloadStart,
    ReloadComplete,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Initialized => "initialized",
            EventKind::ReloadStart => "reload-start",
            EventKind::ReloadComplete => "reload-complete",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Peer/connection the failing operation was serving, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub peer: String,
}

impl ErrorContext {
    pub fn peer(peer: impl Into<String>) -> Self {
        Self { peer: peer.into() }
    }
}

/// Event payloads
#[derive(Debug, Clone)]
pub enum KernelEvent {
    Initialized,
    ReloadStart,
    ReloadComplete { success: bool },
    Error {
        error: Arc<ModuleError>,
        context: Option<ErrorContext>,
    },
}

impl KernelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            KernelEvent::Initialized => EventKind::Initialized,
            KernelEvent::ReloadStart => EventKind::ReloadStart,
            KernelEvent::ReloadComplete { .. } => EventKind::ReloadComplete,
            KernelEvent::Error { .. } => EventKind::Error,
        }
    }

    pub fn error(error: ModuleError) -> Self {
        KernelEvent::Error {
            error: Arc::new(error),
            context: None,
        }
    }

    pub fn error_with_context(error: ModuleError, context: ErrorContext) -> Self {
        KernelEvent::Error {
            error: Arc::new(error),
            context: Some(context),
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&KernelEvent) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    by_kind: HashMap<EventKind, Vec<(SubscriptionId, Handler)>>,
}

/// Event subscription manager
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Subscribers>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a handler to one event kind
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&KernelEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .by_kind
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!("Subscribed {:?} to {}", id, kind);
        id
    }

    /// Subscribe a channel to several event kinds
    ///
    /// Events are forwarded until the receiver is dropped.
    pub fn subscribe_channel(&self, kinds: &[EventKind]) -> mpsc::UnboundedReceiver<KernelEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        for kind in kinds {
            let tx = tx.clone();
            self.subscribe(*kind, move |event| {
                // Receiver gone: nothing left to deliver to
                let _ = tx.send(event.clone());
            });
        }
        rx
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let mut removed = false;
        for handlers in subscribers.by_kind.values_mut() {
            let before = handlers.len();
            handlers.retain(|(sub, _)| *sub != id);
            removed |= handlers.len() != before;
        }
        removed
    }

    /// Remove every subscriber of one kind
    pub fn remove_listeners(&self, kind: EventKind) {
        self.lock().by_kind.remove(&kind);
    }

    /// Remove every subscriber of every kind
    pub fn remove_all_listeners(&self) {
        self.lock().by_kind.clear();
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lock().by_kind.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to its subscribers in subscription order
    ///
    /// Handlers run outside the lock so they may subscribe or emit. A
    /// panicking handler is logged and skipped.
    pub fn emit(&self, event: KernelEvent) {
        let kind = event.kind();
        let handlers: Vec<Handler> = self
            .lock()
            .by_kind
            .get(&kind)
            .map(|handlers| handlers.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!("Event {} has no subscribers", kind);
            return;
        }

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                warn!("Subscriber for {} panicked", kind);
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.lock();
        let counts: HashMap<EventKind, usize> = subscribers
            .by_kind
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventBus").field("subscribers", &counts).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_emit_reaches_matching_kind_only() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.subscribe(EventKind::ReloadStart, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(KernelEvent::ReloadStart);
        bus.emit(KernelEvent::Initialized);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_and_remove_all() {
        let bus = EventBus::new();
        let id = bus.subscribe(EventKind::Error, |_| {});
        bus.subscribe(EventKind::Error, |_| {});
        bus.subscribe(EventKind::Initialized, |_| {});
        assert_eq!(bus.listener_count(EventKind::Error), 2);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.listener_count(EventKind::Error), 1);

        bus.remove_all_listeners();
        assert_eq!(bus.listener_count(EventKind::Error), 0);
        assert_eq!(bus.listener_count(EventKind::Initialized), 0);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe(EventKind::Initialized, |_| panic!("subscriber bug"));
        let counter = Arc::clone(&hits);
        bus.subscribe(EventKind::Initialized, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(KernelEvent::Initialized);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_channel_subscription_carries_error_context() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_channel(&[EventKind::Error]);

        bus.emit(KernelEvent::error_with_context(
            ModuleError::OperationError("socket closed".into()),
            ErrorContext::peer("10.0.0.7:5123"),
        ));

        match rx.recv().await.unwrap() {
            KernelEvent::Error { error, context } => {
                assert!(error.to_string().contains("socket closed"));
                assert_eq!(context.unwrap().peer, "10.0.0.7:5123");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
