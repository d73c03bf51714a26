//! Prometheus plumbing shared by the worker and engine services.

use std::time::Instant;

use axum::{
    body::Body, extract::MatchedPath, http::Request, middleware::Next, response::IntoResponse,
    routing::get, Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Buckets sized for this workload: a worker step on a small strip is
/// sub-millisecond, a whole turn over HTTP lands in the low tens of
/// milliseconds, and a control call against a paused loop can sit for
/// seconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)
        .expect("latency bucket list is non-empty")
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

/// Adds `/metrics` to a service router. Installing the global recorder
/// is the caller's choice: tests spawn several services per process and
/// must not install it twice.
pub fn setup_metrics_routes(router: Router) -> Router {
    let handle = install_recorder();

    router.route("/metrics", get(move || std::future::ready(handle.render())))
}

/// Middleware recording request counts and latency per route and status.
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let started = Instant::now();

    // Label by route template so `/step` aggregates into one series per
    // service no matter which worker answered.
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let method = req.method().to_string();

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("route", route),
        ("status", response.status().as_u16().to_string()),
    ];

    metrics::counter!("gol_http_requests_total", &labels).increment(1);
    metrics::histogram!("gol_http_request_duration_seconds", &labels)
        .record(started.elapsed().as_secs_f64());

    response
}
