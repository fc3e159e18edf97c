use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::buffer::EnqueuePolicy;
use crate::service::Limits;
use crate::writer::WriterConfig;

/// What to do when a producer hits a full ingestion buffer.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyArg {
    /// Wait for capacity up to --enqueue-timeout-ms, then fail. Correct
    /// backpressure; producers slow down instead of losing data.
    Block,
    /// Fail immediately. For producers with strict latency SLAs.
    Reject,
}

#[derive(Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    /// Address the ingestion endpoint binds to
    #[clap(long, env = "HERMES_BIND", default_value = "127.0.0.1:50051")]
    pub bind: SocketAddr,

    /// Store gateway endpoint(s); comma separated, tried in order on
    /// connect-level failures
    #[clap(
        long = "store-endpoint",
        env = "HERMES_STORE_ENDPOINTS",
        value_delimiter = ',',
        default_value = "http://127.0.0.1:8082"
    )]
    pub store_endpoints: Vec<String>,

    #[clap(long, env = "HERMES_KEYSPACE", default_value = "metrics")]
    pub keyspace: String,

    #[clap(long, env = "HERMES_TABLE", default_value = "metric_events")]
    pub table: String,

    /// Replication factor used when the keyspace is first created
    #[clap(long, default_value = "1")]
    pub replication_factor: u32,

    /// Capacity of the ingestion buffer (records)
    #[clap(long, default_value = "1024")]
    pub buffer_capacity: usize,

    #[clap(long, value_enum, default_value = "block")]
    pub enqueue_policy: PolicyArg,

    /// How long a blocking enqueue waits for capacity
    #[clap(long, default_value = "250")]
    pub enqueue_timeout_ms: u64,

    /// Batch window record bound
    #[clap(long, default_value = "128")]
    pub batch_max_records: usize,

    /// Batch window time bound (milliseconds)
    #[clap(long, default_value = "100")]
    pub batch_max_wait_ms: u64,

    /// Total write attempts per batch before it is dropped
    #[clap(long, default_value = "5")]
    pub write_max_attempts: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[clap(long, default_value = "50")]
    pub write_backoff_ms: u64,

    #[clap(long, default_value = "256")]
    pub max_event_type_bytes: usize,

    #[clap(long, default_value = "65536")]
    pub max_payload_bytes: usize,

    /// Schema bootstrap retry budget
    #[clap(long, default_value = "5")]
    pub bootstrap_attempts: u32,

    /// Delay between schema bootstrap attempts (milliseconds)
    #[clap(long, default_value = "500")]
    pub bootstrap_backoff_ms: u64,

    /// How long shutdown waits for the buffer to drain before giving up
    #[clap(long, default_value = "5000")]
    pub shutdown_grace_ms: u64,
}

impl Config {
    pub fn enqueue_policy(&self) -> EnqueuePolicy {
        match self.enqueue_policy {
            PolicyArg::Block => EnqueuePolicy::Block {
                timeout: Duration::from_millis(self.enqueue_timeout_ms),
            },
            PolicyArg::Reject => EnqueuePolicy::Reject,
        }
    }

    pub fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            batch_max_records: self.batch_max_records,
            batch_max_wait: Duration::from_millis(self.batch_max_wait_ms),
            write_max_attempts: self.write_max_attempts,
            write_backoff: Duration::from_millis(self.write_backoff_ms),
        }
    }

    pub fn limits(&self) -> Limits {
        Limits {
            max_event_type_bytes: self.max_event_type_bytes,
            max_payload_bytes: self.max_payload_bytes,
        }
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
