//! Compute-once memoization over a [`CacheStore`].

use std::future::Future;
use std::time::Duration;

use opentelemetry::KeyValue;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::CacheStore;
use crate::error::{Error, Result};
use crate::telemetry::metrics;

/// Return the cached value for `key`, or compute, cache and return it.
///
/// A cached payload that decodes into `T` is returned without calling
/// `compute`. Anything else (missing, expired, empty, undecodable) leads to
/// a fresh computation. Failed computations are returned and never cached.
/// Results are stored as JSON with the given `ttl` (zero means no expiry).
///
/// There is no single-flight: concurrent callers that miss on the same key
/// each run `compute`, and the last write wins.
pub async fn remember<S, T, E, F, Fut>(store: &S, key: &str, ttl: Duration, compute: F) -> Result<T>
where
    S: CacheStore + ?Sized,
    T: Serialize + DeserializeOwned,
    E: Into<Error>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    match store.get(key) {
        Ok(bytes) if !bytes.is_empty() => match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => {
                metrics::cache_lookups().add(1, &[KeyValue::new("result", "hit")]);
                debug!(key, "cache hit");
                return Ok(value);
            }
            Err(e) => {
                warn!(key, error = %e, "cached value does not decode, recomputing");
                metrics::cache_lookups().add(1, &[KeyValue::new("result", "miss")]);
            }
        },
        Ok(_) | Err(Error::NotFound(_)) => {
            metrics::cache_lookups().add(1, &[KeyValue::new("result", "miss")]);
        }
        Err(Error::Expired(_)) => {
            metrics::cache_lookups().add(1, &[KeyValue::new("result", "expired")]);
        }
        Err(e) => {
            warn!(key, error = %e, "cache read failed, recomputing");
            metrics::cache_lookups().add(1, &[KeyValue::new("result", "miss")]);
        }
    }

    let value = compute().await.map_err(Into::into)?;

    let encoded = serde_json::to_vec(&value)?;
    if let Err(e) = store.set(key, encoded, ttl) {
        warn!(key, error = %e, "failed to cache computed value");
    }
    Ok(value)
}
