// Prometheus metrics definitions for the StoryHub backend.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total API requests, by method/endpoint/status.
    pub static ref API_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("storyhub_api_requests_total", "Total API requests"),
        &["method", "endpoint", "status"],
    )
    .unwrap();

    /// Calls made to the generation endpoint.
    pub static ref GENERATION_REQUESTS_TOTAL: IntCounter = IntCounter::new(
        "storyhub_generation_requests_total",
        "Calls made to the generation endpoint",
    )
    .unwrap();

    /// Generation calls that failed upstream or returned an unusable body.
    pub static ref GENERATION_FAILURES_TOTAL: IntCounter = IntCounter::new(
        "storyhub_generation_failures_total",
        "Failed generation calls",
    )
    .unwrap();

    pub static ref STORIES_PUBLISHED_TOTAL: IntCounter = IntCounter::new(
        "storyhub_stories_published_total",
        "Stories published",
    )
    .unwrap();

    /// Like toggles, by resulting direction ("like" / "unlike").
    pub static ref LIKE_TOGGLES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("storyhub_like_toggles_total", "Like toggles applied"),
        &["direction"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    pub static ref GENERATION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "storyhub_generation_duration_seconds",
            "Generation round-trip time in seconds",
        )
        .buckets(vec![0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0]),
    )
    .unwrap();

    /// API request duration in seconds, by endpoint.
    pub static ref API_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "storyhub_api_request_duration_seconds",
            "API request duration in seconds",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0, 30.0]),
        &["endpoint"],
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(API_REQUESTS_TOTAL.clone()),
        Box::new(GENERATION_REQUESTS_TOTAL.clone()),
        Box::new(GENERATION_FAILURES_TOTAL.clone()),
        Box::new(STORIES_PUBLISHED_TOTAL.clone()),
        Box::new(LIKE_TOGGLES_TOTAL.clone()),
        Box::new(GENERATION_DURATION_SECONDS.clone()),
        Box::new(API_REQUEST_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("failed to register metric: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Label value for the `endpoint` dimension: the route template that matched
/// (`/api/stories/{id}`), or `unmatched` so stray paths share one series.
pub fn endpoint_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string())
}

/// Middleware counting every request and timing it per endpoint.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let endpoint = endpoint_label(&req);
    let started = Instant::now();

    let response = next.run(req).await;

    API_REQUEST_DURATION_SECONDS
        .with_label_values(&[endpoint.as_str()])
        .observe(started.elapsed().as_secs_f64());
    API_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), endpoint.as_str(), response.status().as_str()])
        .inc();
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_label_without_route() {
        let req = axum::http::Request::builder()
            .uri("/api/stories/42")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(endpoint_label(&req), "unmatched");
    }

    #[test]
    fn test_gather_metrics_after_increment() {
        register_metrics();
        STORIES_PUBLISHED_TOTAL.inc();
        LIKE_TOGGLES_TOTAL.with_label_values(&["like"]).inc();
        let output = gather_metrics();
        assert!(output.contains("storyhub_stories_published_total"));
        assert!(output.contains("storyhub_like_toggles_total"));
    }
}
