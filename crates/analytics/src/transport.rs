//! Transport seam for analytics batches.
//!
//! `send_batch` is the awaited path used by timer-driven flushes and feeds
//! the retry logic. `send_beacon` is the teardown path: it hands the batch
//! off and returns immediately, with no delivery guarantee.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use swipeflow_core::config::AnalyticsConfig;

use crate::event::EventBatch;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid collector endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Collector returned status {0}")]
    Status(u16),

    #[error("Batch rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Deliver one batch for one visit. Any `Err` enters the retry path.
    async fn send_batch(&self, visit_id: &str, batch: &EventBatch) -> Result<(), TransportError>;

    /// Fire-and-forget delivery used at teardown. Must not block.
    fn send_beacon(&self, visit_id: &str, batch: EventBatch);
}

// ─── HTTP ───────────────────────────────────────────────────────────────────

/// Posts batches to `{endpoint}/api/visits/{visitId}/events`.
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(config: &AnalyticsConfig) -> Result<Self, TransportError> {
        let base = Url::parse(&config.endpoint)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{}: {e}", config.endpoint)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidEndpoint(config.endpoint.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, base })
    }

    pub fn events_url(&self, visit_id: &str) -> Result<Url, TransportError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(["api", "visits", visit_id, "events"]);
        Ok(url)
    }
}

#[async_trait]
impl EventTransport for HttpTransport {
    async fn send_batch(&self, visit_id: &str, batch: &EventBatch) -> Result<(), TransportError> {
        let url = self.events_url(visit_id)?;
        let response = self.client.post(url).json(batch).send().await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(TransportError::Status(status.as_u16()));
        }
        debug!(visit_id, count = batch.len(), status = status.as_u16(), "analytics batch accepted");
        Ok(())
    }

    fn send_beacon(&self, visit_id: &str, batch: EventBatch) {
        let url = match self.events_url(visit_id) {
            Ok(url) => url,
            Err(e) => {
                warn!(visit_id, error = %e, "beacon dropped");
                return;
            }
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(visit_id, count = batch.len(), "no runtime for beacon, batch dropped");
            return;
        };

        let client = self.client.clone();
        let visit_id = visit_id.to_string();
        runtime.spawn(async move {
            if let Err(e) = client.post(url).json(&batch).send().await {
                debug!(visit_id = %visit_id, error = %e, "beacon delivery failed");
            }
        });
    }
}

// ─── Recording ──────────────────────────────────────────────────────────────

/// In-memory transport that records every batch. Visits can be marked as
/// failing to exercise the retry path.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, EventBatch)>>,
    beacons: Mutex<Vec<(String, EventBatch)>>,
    failing: Mutex<HashSet<String>>,
    attempts: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_visit(&self, visit_id: &str) {
        self.failing.lock().insert(visit_id.to_string());
    }

    pub fn heal_visit(&self, visit_id: &str) {
        self.failing.lock().remove(visit_id);
    }

    /// Successfully delivered batches, in completion order.
    pub fn sent(&self) -> Vec<(String, EventBatch)> {
        self.sent.lock().clone()
    }

    pub fn beacons(&self) -> Vec<(String, EventBatch)> {
        self.beacons.lock().clone()
    }

    /// Every `send_batch` call, failed or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for RecordingTransport {
    async fn send_batch(&self, visit_id: &str, batch: &EventBatch) -> Result<(), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(visit_id) {
            return Err(TransportError::Rejected(format!("visit {visit_id} marked failing")));
        }
        self.sent.lock().push((visit_id.to_string(), batch.clone()));
        Ok(())
    }

    fn send_beacon(&self, visit_id: &str, batch: EventBatch) {
        self.beacons.lock().push((visit_id.to_string(), batch));
    }
}
