use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use hermes::buffer;
use hermes::config::Config;
use hermes::server;
use hermes::service::MetricService;
use hermes::stats::IngestStats;
use hermes::store::{bootstrap_schema, HttpStore};
use hermes::writer;

fn main() {
    let config = Config::parse();

    let code = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to start runtime")
        .block_on(async_main(config));

    std::process::exit(code);
}

async fn async_main(config: Config) -> i32 {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info,hermes=info");
    }
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    info!("--- Hermes Telemetry Gateway ---");

    let store = match HttpStore::new(
        config.store_endpoints.clone(),
        &config.keyspace,
        &config.table,
        config.replication_factor,
    ) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to build store client");
            return 1;
        }
    };

    // The store schema must exist before any traffic is accepted.
    info!(
        keyspace = config.keyspace.as_str(),
        table = config.table.as_str(),
        "Bootstrapping schema..."
    );
    if let Err(e) = bootstrap_schema(
        &store,
        config.bootstrap_attempts,
        std::time::Duration::from_millis(config.bootstrap_backoff_ms),
    )
    .await
    {
        error!(error = %e, "Schema bootstrap failed; refusing to serve");
        return 1;
    }

    let stats = Arc::new(IngestStats::default());
    let (buffer_handle, drain) = buffer::channel(config.buffer_capacity, config.enqueue_policy());
    let depth_gauge = buffer_handle.depth_gauge();

    let writer_task = writer::spawn(store, drain, config.writer_config(), stats.clone());

    let service = Arc::new(MetricService::new(
        buffer_handle,
        stats.clone(),
        config.limits(),
    ));
    let routes = server::routes(service.clone(), config.max_payload_bytes);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received; stopping intake");
        let _ = shutdown_tx.send(());
    });

    let server = warp::serve(routes).try_bind_with_graceful_shutdown(config.bind, async {
        shutdown_rx.await.ok();
    });

    let (addr, serving) = match server {
        Ok(bound) => bound,
        Err(e) => {
            error!(error = %e, bind = %config.bind, "Failed to bind ingestion endpoint");
            return 1;
        }
    };

    info!("Listening on {addr}");
    serving.await;

    // Intake is closed. Dropping the last buffer handle (held by the
    // service) closes the channel; the writer flushes what is left and
    // exits. The grace period bounds how long we wait for that.
    drop(service);
    info!("Draining ingestion buffer...");

    match tokio::time::timeout(config.shutdown_grace(), writer_task).await {
        Ok(_) => {
            info!("Drained; shutdown complete");
            0
        }
        Err(_) => {
            let left = depth_gauge.load(Ordering::Relaxed) as u64;
            stats.dropped_at_shutdown.store(left, Ordering::Relaxed);
            error!(
                records = left,
                grace_ms = config.shutdown_grace_ms,
                "Failed to drain within grace period; records dropped at shutdown"
            );
            1
        }
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
