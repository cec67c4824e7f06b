//! Debounced analytics batch queue.
//!
//! Every `enqueue` cancels the pending flush timer and starts a new one, so
//! a burst of events goes out as one flush shortly after the burst ends.
//! A flush groups events by visit, splits each group into batches of at
//! most `max_batch_size`, and sends all batches concurrently. Failed batches
//! come back with their retry counter bumped; events past `max_retries` are
//! dropped. `shutdown` is a separate best-effort path through the
//! transport's beacon.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::{self, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use swipeflow_core::config::AnalyticsConfig;

use crate::event::{AnalyticsEvent, EventBatch};
use crate::transport::EventTransport;

#[derive(Debug, Clone)]
pub struct QueueSettings {
    pub debounce: Duration,
    pub max_batch_size: usize,
    pub max_retries: u32,
}

impl QueueSettings {
    pub fn from_config(config: &AnalyticsConfig) -> Self {
        Self {
            debounce: Duration::from_millis(config.debounce_ms),
            max_batch_size: config.max_batch_size.max(1),
            max_retries: config.max_retries,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from_config(&AnalyticsConfig::default())
    }
}

/// Per-visit delivery counters, in events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisitStats {
    pub sent: u64,
    pub retried: u64,
    pub dropped: u64,
}

/// Outcome of one flush, in events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub batches: usize,
    pub sent: usize,
    pub requeued: usize,
    pub dropped: usize,
}

#[derive(Default)]
struct QueueState {
    buffer: Vec<AnalyticsEvent>,
    pending_flush: Option<JoinHandle<()>>,
    closed: bool,
}

struct QueueInner {
    settings: QueueSettings,
    transport: Arc<dyn EventTransport>,
    state: Mutex<QueueState>,
    stats: DashMap<String, VisitStats>,
}

/// Analytics queue owned by one viewing session. Cheap to clone.
#[derive(Clone)]
pub struct AnalyticsQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for AnalyticsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsQueue")
            .field("settings", &self.inner.settings)
            .field("pending", &self.pending())
            .finish()
    }
}

impl AnalyticsQueue {
    pub fn new(settings: QueueSettings, transport: Arc<dyn EventTransport>) -> Self {
        info!(
            debounce_ms = u64::try_from(settings.debounce.as_millis()).unwrap_or(u64::MAX),
            max_batch_size = settings.max_batch_size,
            max_retries = settings.max_retries,
            "Analytics queue initialized"
        );
        Self {
            inner: Arc::new(QueueInner {
                settings,
                transport,
                state: Mutex::new(QueueState::default()),
                stats: DashMap::new(),
            }),
        }
    }

    /// Buffer an event and reschedule the debounced flush.
    pub fn enqueue(&self, event: AnalyticsEvent) {
        {
            let mut state = self.inner.state.lock();
            if state.closed {
                debug!(visit_id = %event.visit_id, "queue closed, event discarded");
                return;
            }
            state.buffer.push(event);
        }
        metrics::counter!("analytics.queued").increment(1);
        schedule_flush(&self.inner);
    }

    /// Flush everything buffered now, bypassing the timer.
    pub async fn flush(&self) -> FlushReport {
        let report = flush_buffer(&self.inner).await;
        if report.requeued > 0 {
            schedule_flush(&self.inner);
        }
        report
    }

    /// Teardown flush: cancel the timer and hand every buffered event to the
    /// transport's beacon. No retry. Returns the number of events handed off.
    pub fn shutdown(&self) -> usize {
        let drained = {
            let mut state = self.inner.state.lock();
            if let Some(pending) = state.pending_flush.take() {
                pending.abort();
            }
            state.closed = true;
            std::mem::take(&mut state.buffer)
        };

        let count = drained.len();
        for (visit_id, events) in partition(drained, self.inner.settings.max_batch_size) {
            self.inner
                .transport
                .send_beacon(&visit_id, EventBatch::from_events(&events));
        }

        metrics::counter!("analytics.beacon").increment(count as u64);
        info!(count, "analytics queue shut down");
        count
    }

    /// Events currently buffered.
    pub fn pending(&self) -> usize {
        self.inner.state.lock().buffer.len()
    }

    pub fn visit_stats(&self, visit_id: &str) -> Option<VisitStats> {
        self.inner.stats.get(visit_id).map(|s| s.clone())
    }

    pub fn settings(&self) -> &QueueSettings {
        &self.inner.settings
    }
}

/// Replace the pending flush timer. The timer only spawns the flush, so
/// aborting it never interrupts sends already in flight.
fn schedule_flush(inner: &Arc<QueueInner>) {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("no async runtime, analytics events stay buffered until flushed");
        return;
    };

    let mut state = inner.state.lock();
    if state.closed {
        return;
    }
    if let Some(pending) = state.pending_flush.take() {
        pending.abort();
    }

    let timer_inner = inner.clone();
    let debounce = inner.settings.debounce;
    state.pending_flush = Some(runtime.spawn(async move {
        tokio::time::sleep(debounce).await;
        tokio::spawn(async move {
            let report = flush_buffer(&timer_inner).await;
            if report.requeued > 0 {
                schedule_flush(&timer_inner);
            }
        });
    }));
}

async fn flush_buffer(inner: &Arc<QueueInner>) -> FlushReport {
    let drained = std::mem::take(&mut inner.state.lock().buffer);
    let mut report = FlushReport::default();
    if drained.is_empty() {
        return report;
    }

    let batches = partition(drained, inner.settings.max_batch_size);
    report.batches = batches.len();
    debug!(batches = report.batches, "flushing analytics batches");

    // Batches stay here, keyed by task id, so a send task that panics or is
    // aborted still hands its events back to the retry path.
    let mut in_flight: HashMap<task::Id, (String, Vec<AnalyticsEvent>)> = HashMap::new();
    let mut sends = JoinSet::new();
    for (visit_id, events) in batches {
        let transport = inner.transport.clone();
        let batch = EventBatch::from_events(&events);
        let send_visit = visit_id.clone();
        let handle = sends.spawn(async move { transport.send_batch(&send_visit, &batch).await });
        in_flight.insert(handle.id(), (visit_id, events));
    }

    while let Some(joined) = sends.join_next_with_id().await {
        let (id, outcome) = match joined {
            Ok((id, result)) => (id, result.map_err(|e| e.to_string())),
            Err(e) => {
                error!(error = %e, "analytics send task failed");
                (e.id(), Err(e.to_string()))
            }
        };
        let Some((visit_id, events)) = in_flight.remove(&id) else {
            continue;
        };

        match outcome {
            Ok(()) => {
                report.sent += events.len();
                metrics::counter!("analytics.sent").increment(events.len() as u64);
                inner.stats.entry(visit_id).or_default().sent += events.len() as u64;
            }
            Err(reason) => {
                let (requeued, dropped) = requeue(inner, &visit_id, events);
                report.requeued += requeued;
                report.dropped += dropped;
                warn!(
                    visit_id = %visit_id,
                    error = %reason,
                    requeued,
                    dropped,
                    "analytics batch failed"
                );
            }
        }
    }

    report
}

/// Put failed events back at the front of the buffer with their retry
/// counter bumped, dropping those past the retry budget.
fn requeue(inner: &QueueInner, visit_id: &str, events: Vec<AnalyticsEvent>) -> (usize, usize) {
    let max_retries = inner.settings.max_retries;
    let (retry, exhausted): (Vec<_>, Vec<_>) = events
        .into_iter()
        .map(|mut event| {
            event.retry_count += 1;
            event
        })
        .partition(|event| event.retry_count <= max_retries);

    let (requeued, dropped) = (retry.len(), exhausted.len());
    {
        let mut stats = inner.stats.entry(visit_id.to_string()).or_default();
        stats.retried += requeued as u64;
        stats.dropped += dropped as u64;
    }
    metrics::counter!("analytics.retried").increment(requeued as u64);
    metrics::counter!("analytics.dropped").increment(dropped as u64);

    let mut state = inner.state.lock();
    if state.closed {
        return (0, requeued + dropped);
    }
    state.buffer.splice(0..0, retry);
    (requeued, dropped)
}

/// Group by visit in first-seen order, then split into capped batches.
fn partition(events: Vec<AnalyticsEvent>, max_batch_size: usize) -> Vec<(String, Vec<AnalyticsEvent>)> {
    let mut groups: Vec<(String, Vec<AnalyticsEvent>)> = Vec::new();
    for event in events {
        match groups.iter().position(|(visit_id, _)| *visit_id == event.visit_id) {
            Some(index) => groups[index].1.push(event),
            None => groups.push((event.visit_id.clone(), vec![event])),
        }
    }

    let max_batch_size = max_batch_size.max(1);
    let mut batches = Vec::new();
    for (visit_id, mut events) in groups {
        while !events.is_empty() {
            let rest = events.split_off(events.len().min(max_batch_size));
            batches.push((visit_id.clone(), events));
            events = rest;
        }
    }
    batches
}
