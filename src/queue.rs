//! Bounded multi-worker job queue.
//!
//! A fixed pool of worker tasks drains one bounded FIFO channel. Submission
//! never blocks: a saturated channel rejects with [`Error::QueueFull`].
//! Lockable jobs consult the [`LockManager`] so two runs of the same name
//! never overlap; a job that loses the race is dropped, not deferred.
//! Action failures are logged and published as events, never returned to
//! the submitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use opentelemetry::KeyValue;
use tokio::sync::{Mutex as AsyncMutex, broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::error::{Error, Result};
use crate::event::{EventBus, EventKind, JobEvent};
use crate::lock::LockManager;
use crate::model::{Job, JobFn, QueueOptions, QueueState};
use crate::telemetry::job::{record_job_outcome, start_job_span};
use crate::telemetry::metrics;

type SharedReceiver = Arc<AsyncMutex<mpsc::Receiver<Job>>>;

/// The job queue. Construct one per concern at startup and share it by `Arc`.
pub struct JobQueue {
    options: QueueOptions,
    locks: Arc<LockManager>,
    events: Arc<EventBus>,
    running: Arc<AtomicBool>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: QueueState,
    /// Dropped on stop, which closes the channel.
    tx: Option<mpsc::Sender<Job>>,
    /// Held here until `start` hands it to the workers.
    rx: Option<mpsc::Receiver<Job>>,
    shared_rx: Option<SharedReceiver>,
    workers: Vec<JoinHandle<()>>,
}

impl JobQueue {
    /// Create a queue with its own lock manager. Zero-valued options fall
    /// back to 1 worker and 100 slots.
    pub fn new(options: QueueOptions) -> Self {
        Self::with_locks(options, Arc::new(LockManager::new()))
    }

    /// Create a queue that shares an existing lock manager.
    pub fn with_locks(options: QueueOptions, locks: Arc<LockManager>) -> Self {
        let options = options.normalized();
        let (tx, rx) = mpsc::channel(options.channel_size);
        Self {
            options,
            locks,
            events: Arc::new(EventBus::new()),
            running: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(Inner {
                state: QueueState::Created,
                tx: Some(tx),
                rx: Some(rx),
                shared_rx: None,
                workers: Vec::new(),
            }),
        }
    }

    /// Launch the workers. Must be called from within a tokio runtime.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Other(format!("job queue needs a tokio runtime: {e}")))?;

        let mut inner = self.inner();
        if !inner.state.can_transition_to(QueueState::Running) {
            return Err(Error::InvalidTransition {
                from: inner.state,
                to: QueueState::Running,
            });
        }
        let rx = inner
            .rx
            .take()
            .ok_or_else(|| Error::Other("job channel receiver missing".to_string()))?;
        let rx: SharedReceiver = Arc::new(AsyncMutex::new(rx));

        self.running.store(true, Ordering::Release);
        inner.state = QueueState::Running;

        for id in 0..self.options.workers {
            let worker = Worker {
                id,
                rx: Arc::clone(&rx),
                running: Arc::clone(&self.running),
                locks: Arc::clone(&self.locks),
                events: Arc::clone(&self.events),
            };
            inner.workers.push(runtime.spawn(worker.run()));
        }
        inner.shared_rx = Some(rx);

        info!(
            workers = self.options.workers,
            channel_size = self.options.channel_size,
            "job queue started"
        );
        Ok(())
    }

    /// Submit a job without blocking.
    ///
    /// Fails with [`Error::QueueNotRunning`] before `start` or after `stop`,
    /// and with [`Error::QueueFull`] when the channel is saturated.
    pub fn add_job(&self, job: Job) -> Result<()> {
        let name = job.name.clone();
        let inner = self.inner();

        let sent = match inner.tx.as_ref() {
            Some(tx) if self.running.load(Ordering::Acquire) => {
                tx.try_send(job).map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => Error::QueueFull,
                    mpsc::error::TrySendError::Closed(_) => Error::QueueNotRunning,
                })
            }
            _ => Err(Error::QueueNotRunning),
        };
        drop(inner);

        match sent {
            Ok(()) => {
                metrics::jobs_submitted().add(1, &[KeyValue::new("result", "ok")]);
                self.events.emit(EventKind::Accepted { name });
                Ok(())
            }
            Err(e) => {
                let reason = match e {
                    Error::QueueFull => "full",
                    _ => "not_running",
                };
                debug!(job = %name, reason, "job rejected");
                metrics::jobs_submitted().add(1, &[KeyValue::new("result", reason)]);
                self.events.emit(EventKind::Rejected {
                    name,
                    reason: reason.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stop accepting jobs, close the channel and wait for every worker to
    /// exit. Actions already running finish; jobs still buffered are
    /// discarded. Stopping a stopped queue is a no-op.
    pub async fn stop(&self) {
        let (workers, rx) = {
            let mut inner = self.inner();
            if inner.state.is_terminal() {
                return;
            }
            self.running.store(false, Ordering::Release);
            inner.state = QueueState::Stopped;
            inner.tx = None;
            inner.rx = None;
            (std::mem::take(&mut inner.workers), inner.shared_rx.take())
        };

        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %Error::from(e), "worker exited abnormally");
            }
        }

        let mut discarded = 0usize;
        if let Some(rx) = rx {
            let mut rx = rx.lock().await;
            while let Ok(job) = rx.try_recv() {
                discarded += 1;
                metrics::jobs_skipped().add(1, &[KeyValue::new("reason", "discarded")]);
                self.events.emit(EventKind::Discarded { name: job.name });
            }
        }
        if discarded > 0 {
            warn!(discarded, "job queue stopped with buffered jobs");
        } else {
            info!("job queue stopped");
        }
    }

    /// Subscribe to the queue's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> QueueState {
        self.inner().state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Effective sizing, after defaults were applied.
    pub fn options(&self) -> QueueOptions {
        self.options
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Jobs currently buffered in the channel.
    pub fn pending(&self) -> usize {
        self.inner()
            .tx
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct Worker {
    id: usize,
    rx: SharedReceiver,
    running: Arc<AtomicBool>,
    locks: Arc<LockManager>,
    events: Arc<EventBus>,
}

impl Worker {
    async fn run(self) {
        debug!(worker = self.id, "worker started");
        loop {
            let job = {
                let mut rx = self.rx.lock().await;
                rx.recv().await
            };
            let Some(job) = job else {
                break;
            };
            // Best-effort fast shutdown: a job dequeued after stop is dropped.
            if !self.running.load(Ordering::Acquire) {
                self.skip(job.name, "stopping");
                break;
            }
            self.process(job).await;
        }
        debug!(worker = self.id, "worker exited");
    }

    async fn process(&self, job: Job) {
        let Job {
            name,
            action,
            lockable,
        } = job;

        if !lockable {
            self.execute(&name, action).await;
            return;
        }

        if let Err(e) = self.locks.lock(&name) {
            warn!(job = %name, error = %e, "failed to lock job, skipping");
            self.skip(name, "already_running");
            return;
        }
        self.execute(&name, action).await;
        self.locks.unlock(&name);
    }

    /// Run the action on its own task so a panic is caught here.
    async fn execute(&self, name: &str, action: JobFn) {
        let span = start_job_span(name, self.id);
        self.events.emit(EventKind::Started {
            name: name.to_string(),
            worker: self.id,
        });

        let started = Instant::now();
        let joined = tokio::spawn(async move { action().await }.instrument(span.clone())).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(format!("{e:#}")),
            Err(e) => Err(Error::from(e).to_string()),
        };

        let label = if outcome.is_ok() { "completed" } else { "failed" };
        record_job_outcome(&span, label, duration_ms);
        metrics::jobs_executed().add(1, &[KeyValue::new("outcome", label)]);
        metrics::job_duration_ms().record(duration_ms as f64, &[KeyValue::new("outcome", label)]);

        match outcome {
            Ok(()) => {
                debug!(job = name, worker = self.id, duration_ms, "job completed");
                self.events.emit(EventKind::Completed {
                    name: name.to_string(),
                    duration_ms,
                });
            }
            Err(error) => {
                error!(job = name, worker = self.id, %error, "failed to execute job");
                self.events.emit(EventKind::Failed {
                    name: name.to_string(),
                    error,
                    duration_ms,
                });
            }
        }
    }

    fn skip(&self, name: String, reason: &str) {
        metrics::jobs_skipped().add(1, &[KeyValue::new("reason", reason.to_string())]);
        self.events.emit(EventKind::Skipped {
            name,
            reason: reason.to_string(),
        });
    }
}
