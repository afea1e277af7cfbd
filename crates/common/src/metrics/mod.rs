//! Metrics and observability utilities
//!
//! Provides metrics-rs counters and histograms with standardized naming
//! conventions. No exporter is installed here; the embedding application
//! decides how metrics leave the process.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all FinSight metrics
pub const METRICS_PREFIX: &str = "finsight";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of queries planned"
    );

    describe_histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end query planning latency in seconds"
    );

    describe_counter!(
        format!("{}_subqueries_total", METRICS_PREFIX),
        Unit::Count,
        "Total sub-queries issued to the vector store"
    );

    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Per-sub-query retrieval latency in seconds"
    );

    describe_counter!(
        format!("{}_retrieval_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Sub-queries that degraded to an empty result after retries"
    );

    describe_histogram!(
        format!("{}_retrieval_results", METRICS_PREFIX),
        Unit::Count,
        "Chunks returned per successful sub-query"
    );

    describe_histogram!(
        format!("{}_evidence_chunks", METRICS_PREFIX),
        Unit::Count,
        "Evidence chunks surviving dedup and budget bounds"
    );

    describe_counter!(
        format!("{}_calculations_total", METRICS_PREFIX),
        Unit::Count,
        "Derived calculations emitted"
    );

    tracing::info!("Metrics registered");
}

/// Record a completed query plan
pub fn record_query(duration_secs: f64, classification: &str, evidence_count: usize) {
    counter!(
        format!("{}_queries_total", METRICS_PREFIX),
        "classification" => classification.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_query_duration_seconds", METRICS_PREFIX),
        "classification" => classification.to_string()
    )
    .record(duration_secs);

    histogram!(
        format!("{}_evidence_chunks", METRICS_PREFIX),
        "classification" => classification.to_string()
    )
    .record(evidence_count as f64);
}

/// Record a single sub-query retrieval
pub fn record_retrieval(duration_secs: f64, result_count: usize, degraded: bool) {
    counter!(format!("{}_subqueries_total", METRICS_PREFIX)).increment(1);

    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if degraded {
        counter!(format!("{}_retrieval_failures_total", METRICS_PREFIX)).increment(1);
    } else {
        histogram!(format!("{}_retrieval_results", METRICS_PREFIX)).record(result_count as f64);
    }
}

/// Record an emitted derived calculation
pub fn record_calculation(kind: &str) {
    counter!(
        format!("{}_calculations_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_does_not_panic_without_recorder() {
        register_metrics();
        record_query(0.05, "simple", 3);
        record_retrieval(0.01, 5, false);
        record_retrieval(0.01, 0, true);
        record_calculation("growth_rate");
    }
}
