use std::convert::Infallible;
use std::sync::Arc;

use warp::Filter;

use crate::model::MetricRequest;
use crate::service::MetricService;

/// Slack on top of the payload bound for JSON framing and the other fields.
const BODY_OVERHEAD: u64 = 16 * 1024;

/// Builds the ingestion route set.
///
/// Transport concerns (framing, malformed JSON, oversized bodies) are left
/// to warp's default rejections; everything past a well-formed request body
/// answers with a structured `MetricResponse`.
pub fn routes(
    service: Arc<MetricService>,
    max_payload_bytes: usize,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    // 1. POST /v1/metrics (SendMetric)
    let send = warp::post()
        .and(warp::path!("v1" / "metrics"))
        .and(warp::body::content_length_limit(
            max_payload_bytes as u64 + BODY_OVERHEAD,
        ))
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(|req: MetricRequest, service: Arc<MetricService>| async move {
            let resp = service.handle(req).await;
            Ok::<_, warp::Rejection>(warp::reply::json(&resp))
        });

    // 2. GET /v1/stats
    let stats = warp::get()
        .and(warp::path!("v1" / "stats"))
        .and(with_service(service.clone()))
        .and_then(|service: Arc<MetricService>| async move {
            let snap = service.stats().snapshot(service.queue_depth());
            Ok::<_, warp::Rejection>(warp::reply::json(&snap))
        });

    // 3. GET /healthz
    let health = warp::get().and(warp::path!("healthz")).map(|| "ok");

    send.or(stats).or(health)
}

fn with_service(
    service: Arc<MetricService>,
) -> impl Filter<Extract = (Arc<MetricService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}
