use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};

use crate::error::BufferError;
use crate::model::MetricRecord;
use crate::stats::DepthGauge;

/// Behavior of `enqueue` when the buffer is at capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueuePolicy {
    /// Wait for capacity up to `timeout`, then fail with `TimedOut`.
    Block { timeout: Duration },
    /// Fail immediately with `Full`.
    Reject,
}

/// Creates the bounded ingestion buffer.
///
/// The handle side is cloned into every request handler; the drain side is
/// consumed by the durable writer. Dropping every handle closes the channel,
/// which is the writer's signal to flush and exit.
pub fn channel(capacity: usize, policy: EnqueuePolicy) -> (BufferHandle, BufferDrain) {
    let (tx, rx) = mpsc::channel(capacity);
    let depth: DepthGauge = Arc::new(AtomicUsize::new(0));
    (
        BufferHandle {
            tx,
            policy,
            depth: depth.clone(),
        },
        BufferDrain { rx, depth },
    )
}

/// Producer side of the ingestion buffer.
#[derive(Clone)]
pub struct BufferHandle {
    tx: mpsc::Sender<MetricRecord>,
    policy: EnqueuePolicy,
    depth: DepthGauge,
}

impl BufferHandle {
    pub async fn enqueue(&self, record: MetricRecord) -> Result<(), BufferError> {
        match self.policy {
            EnqueuePolicy::Reject => match self.tx.try_send(record) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => return Err(BufferError::Full),
                Err(mpsc::error::TrySendError::Closed(_)) => return Err(BufferError::Closed),
            },
            EnqueuePolicy::Block { timeout: wait } => match timeout(wait, self.tx.send(record)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => return Err(BufferError::Closed),
                Err(_) => return Err(BufferError::TimedOut),
            },
        }
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Records currently queued and not yet pulled by the writer.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Shared occupancy gauge, for the stats surface and shutdown reporting.
    pub fn depth_gauge(&self) -> DepthGauge {
        self.depth.clone()
    }
}

/// Consumer side of the ingestion buffer. Single owner: the durable writer.
pub struct BufferDrain {
    rx: mpsc::Receiver<MetricRecord>,
    depth: DepthGauge,
}

impl BufferDrain {
    /// Pulls the next batch window: up to `max_count` records, or whatever
    /// has accumulated once `max_wait` has elapsed since the first record
    /// of the window arrived. Blocks indefinitely while the buffer is empty.
    ///
    /// Returns `None` once every handle is dropped and the buffer is fully
    /// drained. A close with records still queued yields the remaining
    /// records as final (possibly under-sized) batches first.
    pub async fn dequeue_batch(
        &mut self,
        max_count: usize,
        max_wait: Duration,
    ) -> Option<Vec<MetricRecord>> {
        let first = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);

        let mut batch = Vec::with_capacity(max_count.min(64));
        batch.push(first);

        let deadline = Instant::now() + max_wait;
        while batch.len() < max_count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, self.rx.recv()).await {
                Ok(Some(record)) => {
                    self.depth.fetch_sub(1, Ordering::Relaxed);
                    batch.push(record);
                }
                // Closed: ship what we have; the next call returns None.
                Ok(None) => break,
                // Window elapsed.
                Err(_) => break,
            }
        }
        Some(batch)
    }
}
