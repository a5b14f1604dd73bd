//! Federation metrics.
//!
//! Outcome-labelled operation counters and duration histograms, plus
//! counters for the failure modes an operator actually pages on
//! (partial failures, purge activity). Complements the structured
//! logging already emitted by the engine.

use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Federation operation counter, labelled by operation and outcome.
pub const OPERATIONS: &str = "strata_operations_total";

/// Federation operation duration histogram, labelled by operation.
pub const OPERATION_DURATION: &str = "strata_operation_duration_seconds";

/// Partial-failure counter, labelled by operation.
pub const PARTIAL_FAILURES: &str = "strata_partial_failures_total";

/// Soft-deleted entities physically removed by the purge loop.
pub const PURGED_ENTITIES: &str = "strata_purged_entities_total";

/// Purge loop errors.
pub const PURGE_ERRORS: &str = "strata_purge_errors_total";

/// Registers all federation metric descriptions.
///
/// Call this once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(OPERATIONS, "Total federation operations by outcome");
    describe_histogram!(
        OPERATION_DURATION,
        "Duration of federation operations in seconds"
    );
    describe_counter!(
        PARTIAL_FAILURES,
        "Total operations that left the two systems inconsistent"
    );
    describe_counter!(PURGED_ENTITIES, "Total soft-deleted entities purged");
    describe_counter!(PURGE_ERRORS, "Total purge loop errors");
}

/// Records a completed federation operation.
///
/// `outcome` is `success` or the stable error kind tag.
pub fn record_operation(operation: &str, outcome: &str, duration_secs: f64) {
    let labels = [
        ("operation", operation.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(OPERATIONS, &labels).increment(1);
    histogram!(OPERATION_DURATION, "operation" => operation.to_string()).record(duration_secs);
}

/// Records a detected partial failure.
pub fn record_partial_failure(operation: &str) {
    counter!(PARTIAL_FAILURES, "operation" => operation.to_string()).increment(1);
}

/// Records a purge run.
pub fn record_purge(purged: u64) {
    counter!(PURGED_ENTITIES).increment(purged);
}

/// Records a purge loop error.
pub fn record_purge_error() {
    counter!(PURGE_ERRORS).increment(1);
}
