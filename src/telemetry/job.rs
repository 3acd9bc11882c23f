//! Job execution span helpers.
//!
//! Every action a worker runs is instrumented with a `job.execute` span.

use tracing::Span;

/// Start a span for one job execution.
///
/// The `job.outcome` field is declared empty and filled by
/// [`record_job_outcome`].
pub fn start_job_span(name: &str, worker: usize) -> Span {
    tracing::info_span!(
        "job.execute",
        "job.name" = name,
        "job.worker" = worker,
        "job.outcome" = tracing::field::Empty,
    )
}

/// Record how the execution ended and emit an event scoped to the span.
pub fn record_job_outcome(span: &Span, outcome: &str, duration_ms: u64) {
    span.record("job.outcome", outcome);
    span.in_scope(|| {
        tracing::debug!(outcome, duration_ms, "job_finished");
    });
}
