#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Query result caching for the EV dashboard.
//!
//! [`QueryCache`] stores results per key, collapses identical requests made
//! within the dedup window into one fetch, and retries failed fetches on a
//! fixed interval. [`QuerySlot`] sits on top of a cache and tracks what one
//! view currently shows: the last good data stays visible while a new key
//! loads, and only the most recently requested key may write to it.

pub mod query;
pub mod slot;

use std::sync::Arc;
use std::time::Duration;

pub use query::QueryCache;
pub use slot::{QuerySlot, QueryState};

/// Outcome shared between every caller of one fetch.
pub type SharedResult<T, E> = Result<Arc<T>, Arc<E>>;

/// Timing knobs for a [`QueryCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a successful result is served without refetching.
    pub dedup_interval: Duration,
    /// Retries after the first failed attempt.
    pub retry_count: u32,
    /// Delay before each retry.
    pub retry_interval: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            dedup_interval: Duration::from_secs(2),
            retry_count: 3,
            retry_interval: Duration::from_secs(5),
        }
    }
}
