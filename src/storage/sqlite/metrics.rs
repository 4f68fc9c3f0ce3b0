//! Metrics recording for record store operations.

use std::time::Instant;

/// Records a store operation.
///
/// Emits `record_store_operations_total` (counter) and
/// `record_store_operation_duration_ms` (histogram), both labelled by
/// backend, operation and status.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "record_store_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "record_store_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Records a store operation from its result.
pub fn observe<T>(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    result: &crate::Result<T>,
) {
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
}
