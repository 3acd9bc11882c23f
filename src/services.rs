//! Composition root.
//!
//! The process builds one `Services` at startup and passes clones of the
//! `Arc`s to whatever needs to submit jobs or memoize values. Tests build
//! their own isolated instances.

use std::sync::Arc;

use tracing::info;

use crate::cache::MemoryStore;
use crate::config::Config;
use crate::error::Result;
use crate::queue::JobQueue;

#[derive(Clone)]
pub struct Services {
    pub queue: Arc<JobQueue>,
    pub cache: Arc<MemoryStore>,
}

impl Services {
    /// Build and start the shared queue and cache.
    pub fn from_config(config: &Config) -> Result<Self> {
        let queue = Arc::new(JobQueue::new(config.queue));
        queue.start()?;
        info!(environment = %config.environment, "services ready");
        Ok(Self {
            queue,
            cache: Arc::new(MemoryStore::new()),
        })
    }

    /// Stop the queue, waiting for the workers to exit.
    pub async fn shutdown(&self) {
        self.queue.stop().await;
    }
}
