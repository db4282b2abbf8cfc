//! Query metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is up to
//! the host application.

use metrics::{counter, histogram};
use std::time::Duration;

/// Record one server request.
pub fn record_request(kind: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("feature_query_requests_total", "kind" => kind, "outcome" => outcome).increment(1);
    histogram!("feature_query_request_duration_ms", "kind" => kind)
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// Record a layer whose request failed during a point or box query.
pub fn record_layer_failure(kind: &'static str) {
    counter!("feature_query_layer_failures_total", "kind" => kind).increment(1);
}

/// Record a result dropped because a newer interaction superseded it.
pub fn record_stale_commit() {
    counter!("feature_query_stale_commits_total").increment(1);
}
