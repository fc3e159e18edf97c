use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The Atomic Unit of Hermes
///
/// Constructed by the metric service at acceptance time and immutable
/// afterwards. Ownership moves request handler -> buffer -> writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Primary key in the store. Random v4, assigned here, never by the caller.
    pub id: Uuid,

    /// Short classifier for the metric ("cpu.load", "disk.io", ...)
    pub event_type: String,

    /// Opaque caller-defined payload. Not interpreted, only size-checked.
    pub payload: String,

    /// Wall-clock acceptance time, Unix epoch milliseconds
    pub received_at: u64,
}

impl MetricRecord {
    pub fn new(event_type: String, payload: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            payload,
            received_at: now_millis(),
        }
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// --- Wire Types ---

/// Incoming SendMetric request body. Field names match the producer wire format.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricRequest {
    #[serde(rename = "eventType")]
    pub event_type: String,
    pub data: String,
}

/// Synchronous acknowledgment returned to the producer.
///
/// `status = "success"` means the record was accepted into the ingestion
/// buffer, NOT that it has been written to the store yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricResponse {
    pub status: &'static str,
    pub message: String,
    /// "validation" or "backpressure" on errors, so producers can pick a
    /// retry strategy. Absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

impl MetricResponse {
    pub fn success(message: String) -> Self {
        Self {
            status: "success",
            message,
            reason: None,
        }
    }

    pub fn error(reason: &'static str, message: String) -> Self {
        Self {
            status: "error",
            message,
            reason: Some(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}
