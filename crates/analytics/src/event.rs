//! Analytics event types and the batch body posted to the collector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventType {
    View,
    Interaction,
    TimeSpent,
}

/// A queued analytics event. `enqueued_at` and `retry_count` are queue
/// bookkeeping and never leave the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub visit_id: String,
    pub event_type: AnalyticsEventType,
    pub slide_id: Option<String>,
    /// Milliseconds, for `time_spent` events.
    pub duration: Option<u64>,
    pub metadata: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl AnalyticsEvent {
    pub fn new(visit_id: impl Into<String>, event_type: AnalyticsEventType) -> Self {
        Self {
            visit_id: visit_id.into(),
            event_type,
            slide_id: None,
            duration: None,
            metadata: None,
            enqueued_at: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn view(visit_id: impl Into<String>, slide_id: impl Into<String>) -> Self {
        Self::new(visit_id, AnalyticsEventType::View).on_slide(slide_id)
    }

    pub fn interaction(
        visit_id: impl Into<String>,
        slide_id: impl Into<String>,
        metadata: serde_json::Value,
    ) -> Self {
        Self::new(visit_id, AnalyticsEventType::Interaction)
            .on_slide(slide_id)
            .with_metadata(metadata)
    }

    pub fn time_spent(
        visit_id: impl Into<String>,
        slide_id: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        let mut event = Self::new(visit_id, AnalyticsEventType::TimeSpent).on_slide(slide_id);
        event.duration = Some(duration_ms);
        event
    }

    pub fn on_slide(mut self, slide_id: impl Into<String>) -> Self {
        self.slide_id = Some(slide_id.into());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

// ─── Wire format ────────────────────────────────────────────────────────────

/// One event as the collector sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    pub event_type: AnalyticsEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl From<&AnalyticsEvent> for WireEvent {
    fn from(event: &AnalyticsEvent) -> Self {
        Self {
            event_type: event.event_type,
            slide_id: event.slide_id.clone(),
            duration: event.duration,
            metadata: event.metadata.clone(),
        }
    }
}

/// Body of `POST /api/visits/{visitId}/events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventBatch {
    pub events: Vec<WireEvent>,
}

impl EventBatch {
    pub fn from_events(events: &[AnalyticsEvent]) -> Self {
        Self {
            events: events.iter().map(WireEvent::from).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
