//! Interaction analytics — buffers slide views, interactions and time-spent
//! events per visit and ships them to the collector in small, debounced
//! batches with bounded retry.
//!
//! # Modules
//!
//! - [`event`] — Analytics events and the wire batch format
//! - [`transport`] — Transport seam, HTTP transport, recording transport
//! - [`queue`] — The debounced batch queue

pub mod event;
pub mod queue;
pub mod transport;

pub use event::{AnalyticsEvent, AnalyticsEventType, EventBatch, WireEvent};
pub use queue::{AnalyticsQueue, FlushReport, QueueSettings, VisitStats};
pub use transport::{EventTransport, HttpTransport, RecordingTransport, TransportError};
