//! Expiring key-value cache and the `remember` memoization helper.
//!
//! Expiry is lazy: an entry past its deadline is removed by the `get` that
//! finds it, never by a background sweep. Keys that are written once and
//! never read again stay in memory until deleted.

mod remember;
mod store;

pub use remember::remember;
pub use store::MemoryStore;

use std::fmt::Display;
use std::time::Duration;

use crate::error::Result;

/// A byte-payload cache with per-key expiry.
pub trait CacheStore: Send + Sync {
    /// Fetch the payload for `key`.
    ///
    /// Fails with [`NotFound`](crate::error::Error::NotFound) if absent and
    /// [`Expired`](crate::error::Error::Expired) if past its deadline.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `value` under `key`. A zero `ttl` stores without expiry and
    /// clears any previous deadline for the key.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Remove `key`. Idempotent.
    fn delete(&self, key: &str) -> Result<()>;
}

/// Build a cache key from a prefix and arguments, joined by `:`.
///
/// `cache_key("user", &[&7, &"posts"])` is `"user:7:posts"`.
pub fn cache_key(prefix: &str, args: &[&dyn Display]) -> String {
    args.iter().fold(prefix.to_string(), |mut key, arg| {
        key.push(':');
        key.push_str(&arg.to_string());
        key
    })
}
