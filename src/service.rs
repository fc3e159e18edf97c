use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::BufferHandle;
use crate::error::ValidationError;
use crate::model::{MetricRecord, MetricRequest, MetricResponse};
use crate::stats::IngestStats;

/// Request validation bounds. Oversized input is refused before it can
/// occupy buffer capacity or store bandwidth.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_event_type_bytes: usize,
    pub max_payload_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_event_type_bytes: 256,
            max_payload_bytes: 65536,
        }
    }
}

/// The ingestion-facing half of the pipeline: validates a request, mints the
/// record (id + received_at) and hands it to the buffer.
///
/// The returned acknowledgment reflects enqueue success only; durability is
/// the writer's business and failures there surface through stats and logs.
pub struct MetricService {
    buffer: BufferHandle,
    stats: Arc<IngestStats>,
    limits: Limits,
}

impl MetricService {
    pub fn new(buffer: BufferHandle, stats: Arc<IngestStats>, limits: Limits) -> Self {
        Self {
            buffer,
            stats,
            limits,
        }
    }

    pub async fn handle(&self, request: MetricRequest) -> MetricResponse {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        // Fast-fail path: garbage never touches the buffer.
        if let Err(e) = validate(&request, &self.limits) {
            self.stats.rejected_validation.fetch_add(1, Ordering::Relaxed);
            debug!(event_type = request.event_type.as_str(), error = %e, "request rejected");
            return MetricResponse::error("validation", e.to_string());
        }

        let record = MetricRecord::new(request.event_type, request.data);
        let id = record.id;
        let event_type = record.event_type.clone();

        debug!(%id, event_type = event_type.as_str(), "Received Metric");

        match self.buffer.enqueue(record).await {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                MetricResponse::success(format!("Metric received: {event_type}"))
            }
            Err(e) => {
                self.stats.rejected_backpressure.fetch_add(1, Ordering::Relaxed);
                warn!(%id, event_type = event_type.as_str(), error = %e, "enqueue failed");
                MetricResponse::error("backpressure", e.to_string())
            }
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.buffer.depth()
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}

fn validate(request: &MetricRequest, limits: &Limits) -> Result<(), ValidationError> {
    if request.event_type.is_empty() {
        return Err(ValidationError("eventType must not be empty".into()));
    }
    if request.event_type.len() > limits.max_event_type_bytes {
        return Err(ValidationError(format!(
            "eventType exceeds {} bytes",
            limits.max_event_type_bytes
        )));
    }
    if request.data.is_empty() {
        return Err(ValidationError("data must not be empty".into()));
    }
    if request.data.len() > limits.max_payload_bytes {
        return Err(ValidationError(format!(
            "data exceeds {} bytes",
            limits.max_payload_bytes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{self, BufferDrain, EnqueuePolicy};

    fn service(capacity: usize) -> (MetricService, BufferDrain) {
        let (handle, drain) = buffer::channel(capacity, EnqueuePolicy::Reject);
        let svc = MetricService::new(handle, Arc::new(IngestStats::default()), Limits::default());
        (svc, drain)
    }

    fn request(event_type: &str, data: &str) -> MetricRequest {
        MetricRequest {
            event_type: event_type.to_string(),
            data: data.to_string(),
        }
    }

    #[tokio::test]
    async fn valid_request_is_acknowledged_and_enqueued() {
        let (svc, _drain) = service(4);
        let resp = svc.handle(request("cpu.load", "0.73")).await;

        assert!(resp.is_success());
        assert_eq!(resp.message, "Metric received: cpu.load");
        assert_eq!(svc.queue_depth(), 1);
        assert_eq!(svc.stats().enqueued.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn empty_event_type_never_reaches_buffer() {
        let (svc, _drain) = service(4);
        let resp = svc.handle(request("", "0.73")).await;

        assert_eq!(resp.status, "error");
        assert_eq!(resp.reason, Some("validation"));
        assert_eq!(svc.queue_depth(), 0);
        assert_eq!(svc.stats().rejected_validation.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn oversized_payload_is_rejected() {
        let (svc, _drain) = service(4);
        let big = "x".repeat(Limits::default().max_payload_bytes + 1);
        let resp = svc.handle(request("cpu.load", &big)).await;

        assert_eq!(resp.reason, Some("validation"));
        assert_eq!(svc.queue_depth(), 0);
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let (svc, _drain) = service(4);
        let resp = svc.handle(request("cpu.load", "")).await;

        assert_eq!(resp.reason, Some("validation"));
        assert_eq!(svc.queue_depth(), 0);
    }

    #[tokio::test]
    async fn full_buffer_surfaces_backpressure() {
        let (svc, _drain) = service(1);
        assert!(svc.handle(request("cpu.load", "0.73")).await.is_success());

        let resp = svc.handle(request("cpu.load", "0.74")).await;
        assert_eq!(resp.status, "error");
        assert_eq!(resp.reason, Some("backpressure"));
        assert_eq!(
            svc.stats().rejected_backpressure.load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn closed_pipeline_reports_backpressure() {
        let (handle, drain) = buffer::channel(4, EnqueuePolicy::Reject);
        drop(drain);
        let svc = MetricService::new(handle, Arc::new(IngestStats::default()), Limits::default());

        let resp = svc.handle(request("cpu.load", "0.73")).await;
        assert_eq!(resp.reason, Some("backpressure"));
    }
}
