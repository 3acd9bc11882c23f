//! Structured events emitted by the job queue.
//!
//! The queue swallows action failures by design; subscribers use this
//! stream to observe them (and everything else a job goes through) without
//! changing delivery semantics. Emission never blocks, and events are
//! dropped when nobody is subscribed.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Capacity of the broadcast buffer. Slow subscribers see `Lagged`.
const EVENT_BUFFER: usize = 1024;

/// A structured event emitted by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    /// Monotonic sequence number. Consumers can detect gaps.
    pub seq: u64,
    /// When this event occurred.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Submission accepted into the channel.
    Accepted { name: String },
    /// Submission refused (`full` or `not_running`).
    Rejected { name: String, reason: String },
    /// A worker began running the action.
    Started { name: String, worker: usize },
    Completed { name: String, duration_ms: u64 },
    /// The action returned an error or panicked.
    Failed {
        name: String,
        error: String,
        duration_ms: u64,
    },
    /// Dequeued but not run (lock contention, or the queue was stopping).
    Skipped { name: String, reason: String },
    /// Still buffered when the queue stopped.
    Discarded { name: String },
}

impl EventKind {
    /// Name of the job this event concerns.
    pub fn job_name(&self) -> &str {
        match self {
            EventKind::Accepted { name }
            | EventKind::Rejected { name, .. }
            | EventKind::Started { name, .. }
            | EventKind::Completed { name, .. }
            | EventKind::Failed { name, .. }
            | EventKind::Skipped { name, .. }
            | EventKind::Discarded { name } => name,
        }
    }
}

/// Sequenced fan-out of [`JobEvent`]s.
#[derive(Debug)]
pub(crate) struct EventBus {
    tx: broadcast::Sender<JobEvent>,
    seq: AtomicU64,
}

impl EventBus {
    pub(crate) fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tx,
            seq: AtomicU64::new(0),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit(&self, kind: EventKind) {
        if self.tx.receiver_count() == 0 {
            return;
        }
        let event = JobEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed) + 1,
            timestamp: Utc::now(),
            kind,
        };
        // Only fails when every receiver has gone away in the meantime.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let kind = EventKind::Skipped {
            name: "digest".to_string(),
            reason: "already_running".to_string(),
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "skipped");
        assert_eq!(json["name"], "digest");
    }

    #[test]
    fn sequence_numbers_increase() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(EventKind::Accepted {
            name: "a".to_string(),
        });
        bus.emit(EventKind::Accepted {
            name: "b".to_string(),
        });
        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(second.seq, 2);
        assert_eq!(second.kind.job_name(), "b");
    }
}
