//! "Data uploaded" notifications between ingestion and aggregation.
//!
//! Ingestion calls a [`Publisher`] after storing a source; the aggregation
//! side registers [`Subscriber`]s on an [`EventBus`] and recomputes when a
//! notification arrives. There is no global bus: whoever wires the pipeline
//! owns the instance.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::models::SourceType;

/// Name of the notification emitted after a successful ingestion.
pub const DATA_UPLOADED_EVENT: &str = "vc:data:uploaded";

// ── DataUploaded ──────────────────────────────────────────────────────────────

/// Payload of [`DATA_UPLOADED_EVENT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUploaded {
    pub source_type: SourceType,
    pub storage_key: String,
    pub record_count: usize,
}

impl DataUploaded {
    pub fn name(&self) -> &'static str {
        DATA_UPLOADED_EVENT
    }
}

// ── Traits ────────────────────────────────────────────────────────────────────

/// Sink for ingestion notifications.
pub trait Publisher: Send + Sync {
    fn publish(&self, event: &DataUploaded);
}

/// Receiver of ingestion notifications.
pub trait Subscriber: Send + Sync {
    fn on_data_uploaded(&self, event: &DataUploaded);
}

impl<F> Subscriber for F
where
    F: Fn(&DataUploaded) + Send + Sync,
{
    fn on_data_uploaded(&self, event: &DataUploaded) {
        self(event)
    }
}

// ── EventBus ──────────────────────────────────────────────────────────────────

/// Fan-out [`Publisher`] delivering each event to every registered
/// [`Subscriber`], in registration order, on the publishing thread.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subscriber` for all future events.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        match self.subscribers.write() {
            Ok(mut subs) => subs.push(subscriber),
            Err(poisoned) => poisoned.into_inner().push(subscriber),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.subscribers.read() {
            Ok(subs) => subs.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Publisher for EventBus {
    fn publish(&self, event: &DataUploaded) {
        // Snapshot so a subscriber may register others without deadlocking.
        let subscribers: Vec<Arc<dyn Subscriber>> = match self.subscribers.read() {
            Ok(subs) => subs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };

        tracing::debug!(
            event = DATA_UPLOADED_EVENT,
            source = %event.source_type,
            key = %event.storage_key,
            records = event.record_count,
            subscribers = subscribers.len(),
            "publishing"
        );

        for subscriber in subscribers {
            subscriber.on_data_uploaded(event);
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
