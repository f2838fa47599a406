//! Keyed result cache with in-flight request sharing.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt as _, Shared};
use tokio::time::Instant;

use crate::{CachePolicy, SharedResult};

type InFlight<T, E> = Shared<BoxFuture<'static, SharedResult<T, E>>>;

struct Entry<T, E> {
    fresh: Option<(Instant, Arc<T>)>,
    in_flight: Option<(u64, InFlight<T, E>)>,
}

impl<T, E> Default for Entry<T, E> {
    fn default() -> Self {
        Self {
            fresh: None,
            in_flight: None,
        }
    }
}

struct Inner<T, E> {
    entries: HashMap<String, Entry<T, E>>,
    next_request: u64,
}

/// Results keyed by query name and parameters.
///
/// Only successes are kept. A failed fetch is handed to every caller that
/// joined it and then forgotten, so the next request fetches again. Entries
/// past the dedup interval with no fetch running are dropped on the next
/// [`QueryCache::get`], so the map only holds keys requested recently.
pub struct QueryCache<T, E> {
    policy: CachePolicy,
    inner: Mutex<Inner<T, E>>,
}

impl<T, E> std::fmt::Debug for QueryCache<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("policy", &self.policy)
            .field("entries", &self.lock().entries.len())
            .finish()
    }
}

impl<T, E> Default for QueryCache<T, E> {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl<T, E> QueryCache<T, E> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                next_request: 0,
            }),
        }
    }

    /// The cache's timing policy.
    #[must_use]
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Drops the stored result for `key`. An in-flight fetch is abandoned
    /// and will not repopulate the entry.
    pub fn invalidate(&self, key: &str) {
        self.lock().entries.remove(key);
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> QueryCache<T, E>
where
    T: Send + Sync + 'static,
    E: Display + Send + Sync + 'static,
{
    /// Returns the result for `key`, calling `fetch` only when needed.
    ///
    /// A result younger than the dedup interval is returned as-is. A fetch
    /// already running for `key` is joined instead of starting another.
    /// Otherwise `fetch` runs, retried per the policy on failure.
    ///
    /// # Errors
    ///
    /// Returns the last fetch error once every retry has failed.
    pub async fn get<F, Fut>(&self, key: &str, fetch: F) -> SharedResult<T, E>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (request, pending) = {
            let mut inner = self.lock();
            let Inner {
                entries,
                next_request,
            } = &mut *inner;

            let dedup_interval = self.policy.dedup_interval;
            entries.retain(|_, entry| {
                entry.in_flight.is_some()
                    || entry
                        .fresh
                        .as_ref()
                        .is_some_and(|(at, _)| at.elapsed() < dedup_interval)
            });

            let entry = entries.entry(key.to_string()).or_default();

            if let Some((at, data)) = &entry.fresh
                && at.elapsed() < self.policy.dedup_interval
            {
                log::debug!("Cache hit for {key}");
                return Ok(Arc::clone(data));
            }

            if let Some((request, pending)) = &entry.in_flight {
                log::debug!("Joining in-flight request for {key}");
                (*request, pending.clone())
            } else {
                *next_request += 1;
                let pending = fetch_with_retry(self.policy, key.to_string(), fetch)
                    .boxed()
                    .shared();
                entry.in_flight = Some((*next_request, pending.clone()));
                (*next_request, pending)
            }
        };

        let result = pending.await;

        let mut inner = self.lock();
        if let Some(entry) = inner.entries.get_mut(key)
            && entry
                .in_flight
                .as_ref()
                .is_some_and(|(current, _)| *current == request)
        {
            entry.in_flight = None;
            if let Ok(data) = &result {
                entry.fresh = Some((Instant::now(), Arc::clone(data)));
            }
        }

        result
    }
}

async fn fetch_with_retry<T, E, F, Fut>(
    policy: CachePolicy,
    key: String,
    fetch: F,
) -> SharedResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0u32;
    loop {
        match fetch().await {
            Ok(data) => return Ok(Arc::new(data)),
            Err(e) if attempt < policy.retry_count => {
                attempt += 1;
                log::warn!(
                    "Query {key} failed, retry {attempt}/{} in {:?}: {e}",
                    policy.retry_count,
                    policy.retry_interval
                );
                tokio::time::sleep(policy.retry_interval).await;
            }
            Err(e) => {
                log::error!("Query {key} failed after {} attempts: {e}", attempt + 1);
                return Err(Arc::new(e));
            }
        }
    }
}
