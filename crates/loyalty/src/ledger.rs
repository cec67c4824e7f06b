//! Points ledger: a per-session running total with gain history and gain
//! notifications. The total never decreases.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use swipeflow_core::subscribers::{SubscriberSet, Subscription};

/// One credited gain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsGain {
    pub amount: u64,
    pub reason: String,
    pub total_after: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LedgerState {
    total: u64,
    history: Vec<PointsGain>,
}

pub struct PointsLedger {
    state: Mutex<LedgerState>,
    subscribers: SubscriberSet<PointsGain>,
}

impl PointsLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            subscribers: SubscriberSet::new("points"),
        }
    }

    /// Credit `amount` points. Negative amounts are clamped to zero, and a
    /// zero credit is neither recorded nor notified. Returns the credited
    /// amount.
    pub fn add_points(&self, amount: i64, reason: impl Into<String>) -> u64 {
        let reason = reason.into();
        let credited = amount.max(0) as u64;
        if credited == 0 {
            debug!(amount, reason = %reason, "non-positive points ignored");
            return 0;
        }

        let gain = {
            let mut state = self.state.lock();
            state.total = state.total.saturating_add(credited);
            let gain = PointsGain {
                amount: credited,
                reason,
                total_after: state.total,
                timestamp: Utc::now(),
            };
            state.history.push(gain.clone());
            gain
        };

        metrics::counter!("points.awarded").increment(credited);
        info!(
            amount = gain.amount,
            reason = %gain.reason,
            total = gain.total_after,
            "points gained"
        );

        self.subscribers.dispatch(&gain);
        credited
    }

    pub fn total(&self) -> u64 {
        self.state.lock().total
    }

    pub fn history(&self) -> Vec<PointsGain> {
        self.state.lock().history.clone()
    }

    /// Be notified of every credited gain, after the total is updated.
    pub fn subscribe_to_gain<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PointsGain) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribers.subscribe(handler)
    }
}

impl Default for PointsLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PointsLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PointsLedger")
            .field("total", &state.total)
            .field("gains", &state.history.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_total_is_sum_of_non_negative_amounts() {
        let ledger = PointsLedger::new();
        for amount in [5, 0, 12, -7, 3, i64::MIN] {
            ledger.add_points(amount, "test");
        }
        assert_eq!(ledger.total(), 20);
        assert_eq!(ledger.history().len(), 3);
    }

    #[test]
    fn test_history_records_running_total() {
        let ledger = PointsLedger::new();
        ledger.add_points(10, "answer");
        ledger.add_points(50, "form_complete");

        let history = ledger.history();
        assert_eq!(history[0].reason, "answer");
        assert_eq!(history[0].total_after, 10);
        assert_eq!(history[1].total_after, 60);
        assert!(history[0].timestamp <= history[1].timestamp);
    }

    #[test]
    fn test_gain_notifications() {
        let ledger = PointsLedger::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = seen.clone();
        let sub = ledger.subscribe_to_gain(move |gain| {
            s.lock().push((gain.amount, gain.total_after));
            Ok(())
        });

        ledger.add_points(4, "a");
        ledger.add_points(-4, "b");
        ledger.add_points(6, "c");
        sub.unsubscribe();
        ledger.add_points(1, "d");

        assert_eq!(*seen.lock(), vec![(4, 4), (6, 10)]);
        assert_eq!(ledger.total(), 11);
    }

    #[test]
    fn test_failing_subscriber_does_not_undo_gain() {
        let ledger = PointsLedger::new();
        ledger.subscribe_to_gain(|_| anyhow::bail!("badge renderer offline"));
        assert_eq!(ledger.add_points(8, "answer"), 8);
        assert_eq!(ledger.total(), 8);
    }

    #[test]
    fn test_total_saturates() {
        let ledger = PointsLedger::new();
        ledger.add_points(i64::MAX, "a");
        ledger.add_points(i64::MAX, "b");
        ledger.add_points(i64::MAX, "c");
        assert_eq!(ledger.total(), u64::MAX);
    }
}
