//! # jobq
//!
//! In-process background work for a request-serving application.
//!
//! Provides a bounded multi-worker job queue with per-name mutual exclusion
//! ([`queue`], [`lock`]), single-shot promises ([`promise`]), an expiring
//! key-value cache with a `remember` memoization helper ([`cache`]), and
//! tracing/OpenTelemetry setup ([`telemetry`]).

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod lock;
pub mod model;
pub mod promise;
pub mod queue;
pub mod services;
pub mod telemetry;

pub use cache::{CacheStore, MemoryStore, cache_key, remember};
pub use error::{Error, Result};
pub use model::{Job, QueueOptions, QueueState};
pub use promise::Promise;
pub use queue::JobQueue;
