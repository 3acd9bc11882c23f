//! Core data model.
//!
//! A job is a named unit of fire-and-forget work. Its name is its identity
//! for locking and logging; the action is opaque to the queue.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// Boxed future returned by a job action.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// The work itself. Invoked exactly once by whichever worker dequeues the job.
pub type JobFn = Box<dyn FnOnce() -> JobFuture + Send + 'static>;

/// A unit of work submitted to a [`JobQueue`](crate::queue::JobQueue).
pub struct Job {
    /// Identity for locking and logging. Callers may fold parameters into
    /// the name (e.g. `send-reset-email-alice@example.com`).
    pub name: String,

    /// The action to run.
    pub action: JobFn,

    /// If true, two jobs with the exact same name never run concurrently.
    /// A second one arriving while the first runs is dropped, not deferred.
    pub lockable: bool,
}

impl Job {
    /// Create a job from an async action.
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            action: Box::new(move || -> JobFuture { Box::pin(action()) }),
            lockable: false,
        }
    }

    /// Create a job from a synchronous action. It runs on the blocking pool
    /// so it can do blocking I/O without stalling the workers.
    pub fn blocking<F>(name: impl Into<String>, action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::new(name, move || async move {
            tokio::task::spawn_blocking(action)
                .await
                .map_err(|e| anyhow::anyhow!("blocking action did not finish: {e}"))?
        })
    }

    /// Mark the job lockable.
    pub fn lockable(mut self) -> Self {
        self.lockable = true;
        self
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("lockable", &self.lockable)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Queue options
// ---------------------------------------------------------------------------

pub const DEFAULT_WORKERS: usize = 1;
pub const DEFAULT_CHANNEL_SIZE: usize = 100;

/// Sizing for a job queue. Zero means "use the default".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueOptions {
    /// Number of worker tasks draining the channel.
    pub workers: usize,
    /// Capacity of the bounded channel.
    pub channel_size: usize,
}

impl QueueOptions {
    pub fn new(workers: usize, channel_size: usize) -> Self {
        Self {
            workers,
            channel_size,
        }
    }

    /// Replace zero values with the defaults (1 worker, 100 slots).
    pub fn normalized(self) -> Self {
        Self {
            workers: if self.workers == 0 {
                DEFAULT_WORKERS
            } else {
                self.workers
            },
            channel_size: if self.channel_size == 0 {
                DEFAULT_CHANNEL_SIZE
            } else {
                self.channel_size
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Queue state
// ---------------------------------------------------------------------------

/// Lifecycle state of a job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    /// Constructed, workers not launched. Submissions are rejected.
    Created,
    /// Workers launched, accepting submissions.
    Running,
    /// Channel closed. Terminal.
    Stopped,
}

impl QueueState {
    /// Can transition from self to `to`?
    pub fn can_transition_to(self, to: QueueState) -> bool {
        use QueueState::*;
        matches!(
            (self, to),
            (Created, Running) | (Created, Stopped) | (Running, Stopped)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, QueueState::Stopped)
    }
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueueState::Created => "created",
            QueueState::Running => "running",
            QueueState::Stopped => "stopped",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_options_fall_back_to_defaults() {
        let opts = QueueOptions::new(0, 0).normalized();
        assert_eq!(opts, QueueOptions::new(1, 100));
    }

    #[test]
    fn explicit_options_are_kept() {
        let opts = QueueOptions::new(4, 8).normalized();
        assert_eq!(opts, QueueOptions::new(4, 8));
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(QueueState::Stopped.is_terminal());
        assert!(!QueueState::Stopped.can_transition_to(QueueState::Running));
        assert!(QueueState::Created.can_transition_to(QueueState::Running));
        assert!(!QueueState::Running.can_transition_to(QueueState::Running));
    }
}
