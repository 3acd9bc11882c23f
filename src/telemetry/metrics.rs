//! Metric instrument factories for jobq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"jobq"` meter. Without an
//! installed provider they are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for jobq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("jobq")
}

/// Counter: job submissions.
/// Labels: `result` ("ok" | "full" | "not_running").
pub fn jobs_submitted() -> Counter<u64> {
    meter()
        .u64_counter("jobq.jobs.submitted")
        .with_description("Number of job submissions")
        .build()
}

/// Counter: job actions that ran.
/// Labels: `outcome` ("completed" | "failed").
pub fn jobs_executed() -> Counter<u64> {
    meter()
        .u64_counter("jobq.jobs.executed")
        .with_description("Number of job actions executed")
        .build()
}

/// Counter: dequeued jobs that never ran.
/// Labels: `reason` ("already_running" | "stopping" | "discarded").
pub fn jobs_skipped() -> Counter<u64> {
    meter()
        .u64_counter("jobq.jobs.skipped")
        .with_description("Number of dequeued jobs that were not executed")
        .build()
}

/// Histogram: action duration in milliseconds.
/// Labels: `outcome`.
pub fn job_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("jobq.job.duration_ms")
        .with_description("Job action duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: cache lookups made by `remember`.
/// Labels: `result` ("hit" | "miss" | "expired").
pub fn cache_lookups() -> Counter<u64> {
    meter()
        .u64_counter("jobq.cache.lookups")
        .with_description("Number of cache lookups")
        .build()
}
