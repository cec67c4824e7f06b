//! Ordered subscriber registry shared by the trigger bus and the points
//! ledger.
//!
//! Handlers are registered under an explicit id and removed through the
//! returned [`Subscription`]. Dispatch never holds the registry lock while a
//! handler runs, so handlers may subscribe, unsubscribe, or dispatch again.
//! A failing or panicking handler is logged and skipped; the remaining
//! handlers still receive the event.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

pub type SubscriberId = u64;

/// Boxed event handler. Errors are logged by the dispatcher, never propagated.
pub type Handler<E> = Arc<dyn Fn(&E) -> anyhow::Result<()> + Send + Sync>;

struct Registry<E> {
    next_id: SubscriberId,
    entries: Vec<(SubscriberId, Handler<E>)>,
}

impl<E> Registry<E> {
    fn contains(&self, id: SubscriberId) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }

    fn remove(&mut self, id: SubscriberId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }
}

/// Outcome of a single dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Ordered set of handlers for one topic.
pub struct SubscriberSet<E> {
    topic: &'static str,
    registry: Arc<Mutex<Registry<E>>>,
}

impl<E: 'static> SubscriberSet<E> {
    pub fn new(topic: &'static str) -> Self {
        Self {
            topic,
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                entries: Vec::new(),
            })),
        }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Register a handler. Delivery order follows registration order.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.registry.lock();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.entries.push((id, Arc::new(handler)));
            id
        };

        let weak: Weak<Mutex<Registry<E>>> = Arc::downgrade(&self.registry);
        let topic = self.topic;
        Subscription::new(id, move || {
            if let Some(registry) = weak.upgrade() {
                if registry.lock().remove(id) {
                    tracing::debug!(topic, subscriber_id = id, "subscriber removed");
                }
            }
        })
    }

    /// Deliver `event` to every currently registered handler, in order.
    pub fn dispatch(&self, event: &E) -> DispatchReport {
        let snapshot: Vec<(SubscriberId, Handler<E>)> = self.registry.lock().entries.clone();
        let mut report = DispatchReport::default();

        for (id, handler) in snapshot {
            // Removed by an earlier handler in this same dispatch.
            if !self.registry.lock().contains(id) {
                continue;
            }

            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    metrics::counter!("subscribers.handler_errors", "topic" => self.topic)
                        .increment(1);
                    error!(topic = self.topic, subscriber_id = id, error = %e, "subscriber failed");
                }
                Err(payload) => {
                    report.failed += 1;
                    metrics::counter!("subscribers.handler_panics", "topic" => self.topic)
                        .increment(1);
                    error!(
                        topic = self.topic,
                        subscriber_id = id,
                        panic = %panic_message(payload.as_ref()),
                        "subscriber panicked"
                    );
                }
            }
        }

        report
    }

    pub fn len(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

// ─── Subscription handle ────────────────────────────────────────────────────

/// Handle to a registered handler. Dropping it does not unsubscribe;
/// call [`Subscription::unsubscribe`], which is idempotent.
pub struct Subscription {
    id: SubscriberId,
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Subscription {
    fn new(id: SubscriberId, cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn unsubscribe(&self) {
        let cancel = self.cancel.lock().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.lock().is_some()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
