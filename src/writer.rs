use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::buffer::BufferDrain;
use crate::model::MetricRecord;
use crate::stats::IngestStats;
use crate::store::MetricStore;

/// Upper bound on a single retry delay regardless of attempt count.
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Batch window and retry tuning for the durable writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Close the window once this many records have accumulated.
    pub batch_max_records: usize,

    /// Close the window once this much time has passed since it opened.
    pub batch_max_wait: Duration,

    /// Total write attempts per batch, first try included.
    pub write_max_attempts: u32,

    /// Base delay for exponential backoff between attempts.
    pub write_backoff: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            batch_max_records: 128,
            batch_max_wait: Duration::from_millis(100),
            write_max_attempts: 5,
            write_backoff: Duration::from_millis(50),
        }
    }
}

/// Spawns the durable writer on the runtime.
///
/// The task owns the store connection and the drain side of the buffer.
/// It exits once every buffer handle is dropped and the remaining records
/// (including a final under-sized batch) have been flushed; awaiting the
/// returned handle is the shutdown drain.
pub fn spawn<S: MetricStore + 'static>(
    store: S,
    drain: BufferDrain,
    config: WriterConfig,
    stats: Arc<IngestStats>,
) -> JoinHandle<()> {
    tokio::spawn(run(store, drain, config, stats))
}

async fn run<S: MetricStore>(
    store: S,
    mut drain: BufferDrain,
    config: WriterConfig,
    stats: Arc<IngestStats>,
) {
    info!(
        batch_max_records = config.batch_max_records,
        batch_max_wait_ms = config.batch_max_wait.as_millis() as u64,
        "durable writer started"
    );

    while let Some(batch) = drain
        .dequeue_batch(config.batch_max_records, config.batch_max_wait)
        .await
    {
        write_with_retry(&store, batch, &config, &stats).await;
    }

    info!("ingestion buffer closed; durable writer exiting");
}

/// Issues one batch to the store, retrying transient failures with capped
/// exponential backoff. A permanent error or retry exhaustion drops the
/// batch: availability over blocking the whole pipeline on one stuck write.
async fn write_with_retry<S: MetricStore>(
    store: &S,
    batch: Vec<MetricRecord>,
    config: &WriterConfig,
    stats: &IngestStats,
) {
    let mut attempt: u32 = 0;

    loop {
        match store.write_batch(&batch).await {
            Ok(()) => {
                stats
                    .records_written
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                stats.batches_written.fetch_add(1, Ordering::Relaxed);
                debug!(records = batch.len(), attempts = attempt + 1, "batch written");
                return;
            }
            Err(e) if e.is_transient() && attempt + 1 < config.write_max_attempts => {
                attempt += 1;
                stats.write_retries.fetch_add(1, Ordering::Relaxed);
                let delay = backoff_delay(config.write_backoff, attempt);
                warn!(
                    attempt,
                    records = batch.len(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient store failure; retrying batch"
                );
                sleep(delay).await;
            }
            Err(e) => {
                stats
                    .records_dropped
                    .fetch_add(batch.len() as u64, Ordering::Relaxed);
                let ids: Vec<String> = batch.iter().map(|r| r.id.to_string()).collect();
                error!(
                    records = batch.len(),
                    attempts = attempt + 1,
                    error = %e,
                    record_ids = ids.join(", ").as_str(),
                    "dropping batch after unrecoverable store failure"
                );
                return;
            }
        }
    }
}

/// base * 2^(attempt-1), capped, with 50-100% jitter so a recovering store
/// is not hit by every writer at once.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let shift = (attempt - 1).min(10);
    let exp = base.saturating_mul(1u32 << shift);
    exp.min(BACKOFF_CAP)
        .mul_f64(rand::thread_rng().gen_range(0.5..1.0))
}
