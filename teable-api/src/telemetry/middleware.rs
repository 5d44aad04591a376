//! Axum middleware recording Prometheus request metrics.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use super::metrics::with_metrics;

/// Label used for requests that matched no route.
const UNMATCHED_PATH: &str = "unmatched";

/// Route template for metric labels (e.g. `/api/intelligence/generate-stream/:base_id`).
///
/// Unmatched requests share one label to keep cardinality bounded.
fn route_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string())
}

/// Record count and latency of every request.
///
/// Request spans and logs come from tower-http's `TraceLayer`.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = route_label(&request);

    let response = next.run(request).await;

    let status = response.status();
    let duration = start.elapsed();
    with_metrics(|m| {
        m.record_http_request(method.as_str(), &path, status.as_u16(), duration.as_secs_f64())
    });

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = duration.as_millis() as u64,
            "Request failed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_route_label_without_match() {
        let request = Request::builder().uri("/nowhere/123").body(Body::empty()).unwrap();
        assert_eq!(route_label(&request), UNMATCHED_PATH);
    }
}
