use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use serde::Serialize;

/// Shared ingestion counters.
///
/// Updated lock-free from the request handlers and the writer task; read by
/// the stats endpoint. Relaxed ordering throughout: these are monitoring
/// counters, not synchronization points.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Requests seen by the metric service, valid or not.
    pub received: AtomicU64,
    /// Requests refused before the buffer (bad eventType/payload).
    pub rejected_validation: AtomicU64,
    /// Requests refused at the buffer (full / enqueue timeout / closed).
    pub rejected_backpressure: AtomicU64,
    /// Records accepted into the buffer.
    pub enqueued: AtomicU64,
    /// Records confirmed written by the store.
    pub records_written: AtomicU64,
    /// Batches confirmed written by the store.
    pub batches_written: AtomicU64,
    /// Transient-failure retries performed by the writer.
    pub write_retries: AtomicU64,
    /// Records dropped after retry exhaustion or a permanent store error.
    pub records_dropped: AtomicU64,
    /// Records still buffered when the shutdown grace period expired.
    pub dropped_at_shutdown: AtomicU64,
}

impl IngestStats {
    pub fn snapshot(&self, queue_depth: usize) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected_validation: self.rejected_validation.load(Ordering::Relaxed),
            rejected_backpressure: self.rejected_backpressure.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            records_written: self.records_written.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            write_retries: self.write_retries.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            dropped_at_shutdown: self.dropped_at_shutdown.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}

/// Point-in-time counter values, serialized by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub received: u64,
    pub rejected_validation: u64,
    pub rejected_backpressure: u64,
    pub enqueued: u64,
    pub records_written: u64,
    pub batches_written: u64,
    pub write_retries: u64,
    pub records_dropped: u64,
    pub dropped_at_shutdown: u64,
    pub queue_depth: usize,
}

/// Occupancy gauge shared between the buffer halves and the stats surface.
pub type DepthGauge = std::sync::Arc<AtomicUsize>;
