//! Trigger bus — an explicit registry of `kind → ordered handlers`.
//!
//! Delivery is synchronous and in subscription order. A handler that errors
//! or panics is logged and skipped without affecting the rest of the
//! dispatch. Modules that only need to publish can hold an `Arc<TriggerBus>`.

use std::collections::HashMap;

use tracing::debug;

use swipeflow_core::subscribers::{DispatchReport, SubscriberSet, Subscription};

use crate::event::{GamificationEvent, TriggerKind};

pub struct TriggerBus {
    channels: HashMap<TriggerKind, SubscriberSet<GamificationEvent>>,
}

impl TriggerBus {
    pub fn new() -> Self {
        let channels = TriggerKind::ALL
            .into_iter()
            .map(|kind| (kind, SubscriberSet::new(kind.as_str())))
            .collect();
        Self { channels }
    }

    fn channel(&self, kind: TriggerKind) -> &SubscriberSet<GamificationEvent> {
        // Every kind gets a channel in `new`.
        &self.channels[&kind]
    }

    /// Register a handler for one trigger kind.
    pub fn subscribe<F>(&self, kind: TriggerKind, handler: F) -> Subscription
    where
        F: Fn(&GamificationEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let subscription = self.channel(kind).subscribe(handler);
        debug!(kind = %kind, subscriber_id = subscription.id(), "trigger subscribed");
        subscription
    }

    /// Deliver an event to every subscriber of its kind.
    pub fn publish(&self, event: &GamificationEvent) -> DispatchReport {
        metrics::counter!("gamification.published", "kind" => event.kind.as_str()).increment(1);
        let report = self.channel(event.kind).dispatch(event);
        debug!(
            kind = %event.kind,
            element_id = event.element_id.as_deref().unwrap_or("-"),
            delivered = report.delivered,
            failed = report.failed,
            "trigger published"
        );
        report
    }

    pub fn publish_kind(
        &self,
        kind: TriggerKind,
        element_id: Option<&str>,
        payload: Option<serde_json::Value>,
    ) -> DispatchReport {
        self.publish(&GamificationEvent {
            kind,
            element_id: element_id.map(str::to_string),
            payload,
        })
    }

    pub fn subscriber_count(&self, kind: TriggerKind) -> usize {
        self.channel(kind).len()
    }
}

impl Default for TriggerBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TriggerBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(&str, usize)> = TriggerKind::ALL
            .iter()
            .map(|k| (k.as_str(), self.subscriber_count(*k)))
            .collect();
        f.debug_struct("TriggerBus").field("subscribers", &counts).finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_publish_reaches_only_matching_kind() {
        let bus = TriggerBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        bus.subscribe(TriggerKind::OnButtonClick, move |e| {
            s.lock().push(e.element_id.clone());
            Ok(())
        });
        let s = seen.clone();
        bus.subscribe(TriggerKind::OnFormComplete, move |_| {
            s.lock().push(Some("form".into()));
            Ok(())
        });

        let report = bus.publish(&GamificationEvent::for_element(TriggerKind::OnButtonClick, "btn1"));
        assert_eq!(report.delivered, 1);
        assert_eq!(*seen.lock(), vec![Some("btn1".to_string())]);
    }

    #[test]
    fn test_erroring_handler_does_not_block_delivery() {
        let bus = TriggerBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o = order.clone();
        bus.subscribe(TriggerKind::OnQuestionAnswer, move |_| {
            o.lock().push(1);
            Ok(())
        });
        bus.subscribe(TriggerKind::OnQuestionAnswer, |_| anyhow::bail!("effect failed"));
        let o = order.clone();
        bus.subscribe(TriggerKind::OnQuestionAnswer, move |_| {
            o.lock().push(3);
            Ok(())
        });

        let report = bus.publish_kind(TriggerKind::OnQuestionAnswer, Some("q1"), None);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(*order.lock(), vec![1, 3]);
    }

    #[test]
    fn test_reentrant_publish_and_unsubscribe() {
        let bus = Arc::new(TriggerBus::new());
        let points_seen = Arc::new(Mutex::new(0));

        let inner = bus.clone();
        let sub = bus.subscribe(TriggerKind::OnFormComplete, move |_| {
            inner.publish(&GamificationEvent::global(TriggerKind::OnPointsGained));
            Ok(())
        });
        let p = points_seen.clone();
        bus.subscribe(TriggerKind::OnPointsGained, move |_| {
            *p.lock() += 1;
            Ok(())
        });

        bus.publish(&GamificationEvent::for_element(TriggerKind::OnFormComplete, "f1"));
        assert_eq!(*points_seen.lock(), 1);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(bus.subscriber_count(TriggerKind::OnFormComplete), 0);
        bus.publish(&GamificationEvent::for_element(TriggerKind::OnFormComplete, "f1"));
        assert_eq!(*points_seen.lock(), 1);
    }
}
