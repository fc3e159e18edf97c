use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{info, warn};

use crate::error::{SchemaError, StoreError};
use crate::model::MetricRecord;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Persistence seam of the pipeline.
///
/// The engine side (writer, bootstrap) only ever sees this trait; the
/// production implementation talks to the wide-column store's statement
/// gateway, tests plug in in-memory fakes.
pub trait MetricStore: Send + Sync {
    /// Idempotently ensure the keyspace and table exist. Safe to run
    /// concurrently from multiple process instances.
    fn ensure_schema(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    /// Persist one batch of records as a single logical write.
    fn write_batch(
        &self,
        records: &[MetricRecord],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;
}

/// Wide-column store backend speaking CQL statements over an HTTP gateway.
///
/// Endpoints are tried in order; a connect-level failure fails over to the
/// next one within the same attempt. An answered-but-failed request is
/// returned as-is for the writer's retry logic to classify.
pub struct HttpStore {
    http: reqwest::Client,
    endpoints: Vec<String>,
    keyspace: String,
    table: String,
    replication_factor: u32,
}

impl HttpStore {
    pub fn new(
        endpoints: Vec<String>,
        keyspace: &str,
        table: &str,
        replication_factor: u32,
    ) -> Result<Self, StoreError> {
        if endpoints.is_empty() {
            return Err(StoreError::Rejected("no store endpoints configured".into()));
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Rejected(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoints,
            keyspace: keyspace.to_string(),
            table: table.to_string(),
            replication_factor,
        })
    }

    async fn exec(&self, cql: String) -> Result<(), StoreError> {
        let mut last_err = None;

        for endpoint in &self.endpoints {
            match self.http.post(endpoint).body(cql.clone()).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(());
                    }
                    let body = resp.text().await.unwrap_or_default();
                    return Err(classify_status(status.as_u16(), &body));
                }
                Err(e) => {
                    warn!(endpoint = endpoint.as_str(), error = %e, "store endpoint unreachable");
                    last_err = Some(StoreError::Unavailable(format!("{endpoint}: {e}")));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| StoreError::Unavailable("no store endpoints configured".into())))
    }
}

impl MetricStore for HttpStore {
    fn ensure_schema(&self) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            // Both statements must succeed before the schema counts as
            // ready; a keyspace without its table is not reported as success.
            self.exec(create_keyspace_cql(&self.keyspace, self.replication_factor))
                .await?;
            self.exec(create_table_cql(&self.keyspace, &self.table))
                .await?;
            Ok(())
        })
    }

    fn write_batch(
        &self,
        records: &[MetricRecord],
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        let cql = insert_batch_cql(&self.keyspace, &self.table, records);
        let empty = records.is_empty();
        Box::pin(async move {
            if empty {
                return Ok(());
            }
            self.exec(cql).await
        })
    }
}

/// Runs `ensure_schema` under the configured retry budget. Transient store
/// errors are retried; anything else (or budget exhaustion) is fatal.
pub async fn bootstrap_schema<S: MetricStore>(
    store: &S,
    attempts: u32,
    backoff: Duration,
) -> Result<(), SchemaError> {
    let mut attempt = 0;
    loop {
        match store.ensure_schema().await {
            Ok(()) => {
                info!("schema ready");
                return Ok(());
            }
            Err(e) if e.is_transient() && attempt + 1 < attempts => {
                attempt += 1;
                warn!(attempt, error = %e, "schema bootstrap attempt failed; retrying");
                tokio::time::sleep(backoff).await;
            }
            Err(e) => return Err(SchemaError(e)),
        }
    }
}

// --- Statement Building ---

/// Escape a string for use inside a CQL single-quoted literal:
/// single quotes are doubled.
fn escape_cql_string(s: &str) -> String {
    s.replace('\'', "''")
}

fn create_keyspace_cql(keyspace: &str, replication_factor: u32) -> String {
    format!(
        "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH replication = \
         {{'class': 'SimpleStrategy', 'replication_factor': {replication_factor}}}"
    )
}

fn create_table_cql(keyspace: &str, table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {keyspace}.{table} (\
         id uuid PRIMARY KEY, \
         event_type text, \
         payload text, \
         received_at timestamp)"
    )
}

fn insert_batch_cql(keyspace: &str, table: &str, records: &[MetricRecord]) -> String {
    let inserts: Vec<String> = records
        .iter()
        .map(|r| {
            format!(
                "INSERT INTO {keyspace}.{table} (id, event_type, payload, received_at) \
                 VALUES ({}, '{}', '{}', {});",
                r.id,
                escape_cql_string(&r.event_type),
                escape_cql_string(&r.payload),
                r.received_at,
            )
        })
        .collect();

    // Distinct primary keys make a logged batch pointless; UNLOGGED keeps
    // the write a single round trip without the batchlog penalty.
    format!(
        "BEGIN UNLOGGED BATCH\n{}\nAPPLY BATCH",
        inserts.join("\n")
    )
}

fn classify_status(code: u16, body: &str) -> StoreError {
    let msg = format!("HTTP {code}: {body}");
    match code {
        408 | 429 | 500..=599 => StoreError::Unavailable(msg),
        _ => StoreError::Rejected(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn escaping_doubles_single_quotes() {
        assert_eq!(escape_cql_string("it's"), "it''s");
        assert_eq!(escape_cql_string("plain"), "plain");
    }

    #[test]
    fn keyspace_and_table_statements_are_idempotent() {
        let ks = create_keyspace_cql("metrics", 3);
        assert!(ks.contains("CREATE KEYSPACE IF NOT EXISTS metrics"));
        assert!(ks.contains("'replication_factor': 3"));

        let tbl = create_table_cql("metrics", "metric_events");
        assert!(tbl.contains("CREATE TABLE IF NOT EXISTS metrics.metric_events"));
        assert!(tbl.contains("id uuid PRIMARY KEY"));
        assert!(tbl.contains("received_at timestamp"));
    }

    #[test]
    fn insert_batch_contains_every_record() {
        let records = vec![
            MetricRecord::new("cpu.load".into(), "0.73".into()),
            MetricRecord::new("disk.io".into(), "rate='high'".into()),
        ];
        let cql = insert_batch_cql("metrics", "metric_events", &records);

        assert!(cql.starts_with("BEGIN UNLOGGED BATCH"));
        assert!(cql.ends_with("APPLY BATCH"));
        for r in &records {
            assert!(cql.contains(&r.id.to_string()));
        }
        assert!(cql.contains("'rate=''high'''"));
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(503, "overloaded").is_transient());
        assert!(classify_status(429, "slow down").is_transient());
        assert!(classify_status(408, "timeout").is_transient());
        assert!(!classify_status(400, "bad statement").is_transient());
        assert!(!classify_status(401, "auth").is_transient());
    }

    struct FlakyStore {
        fail_first: u32,
        calls: AtomicU32,
    }

    impl MetricStore for FlakyStore {
        fn ensure_schema(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call < self.fail_first {
                    Err(StoreError::Unavailable("connection refused".into()))
                } else {
                    Ok(())
                }
            })
        }

        fn write_batch(
            &self,
            _records: &[MetricRecord],
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn bootstrap_retries_transient_failures() {
        let store = FlakyStore {
            fail_first: 2,
            calls: AtomicU32::new(0),
        };
        bootstrap_schema(&store, 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent_across_instances() {
        let store = FlakyStore {
            fail_first: 0,
            calls: AtomicU32::new(0),
        };

        // Sequential re-run and two racing instances: no error either way.
        bootstrap_schema(&store, 3, Duration::from_millis(1))
            .await
            .unwrap();
        bootstrap_schema(&store, 3, Duration::from_millis(1))
            .await
            .unwrap();

        let (a, b) = tokio::join!(
            bootstrap_schema(&store, 3, Duration::from_millis(1)),
            bootstrap_schema(&store, 3, Duration::from_millis(1)),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn bootstrap_gives_up_after_budget() {
        let store = FlakyStore {
            fail_first: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let err = bootstrap_schema(&store, 2, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("schema bootstrap failed"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    struct DeadStore;

    impl MetricStore for DeadStore {
        fn ensure_schema(
            &self,
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async { Err(StoreError::Rejected("auth failure".into())) })
        }

        fn write_batch(
            &self,
            _records: &[MetricRecord],
        ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_permanent_error() {
        let err = bootstrap_schema(&DeadStore, 5, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("auth failure"));
    }
}
