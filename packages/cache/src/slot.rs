//! Per-view query state with stale-while-revalidate semantics.

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use crate::QueryCache;

/// What a view currently shows.
///
/// `data` is the last successful result and survives both reloads and
/// failures. `error` is the most recent failure, cleared by the next
/// success.
#[derive(Debug)]
pub struct QueryState<T, E> {
    /// Last successful result.
    pub data: Option<Arc<T>>,
    /// Most recent failure.
    pub error: Option<Arc<E>>,
    /// A request for the current key has not settled yet.
    pub is_loading: bool,
}

impl<T, E> Default for QueryState<T, E> {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
        }
    }
}

impl<T, E> Clone for QueryState<T, E> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            error: self.error.clone(),
            is_loading: self.is_loading,
        }
    }
}

struct SlotState<T, E> {
    key: Option<String>,
    generation: u64,
    view: QueryState<T, E>,
}

/// One view's handle on a [`QueryCache`].
///
/// Every [`revalidate`](Self::revalidate) starts a new generation. A
/// result is applied only if no newer request was made in the meantime, so
/// a slow response for an old key can never overwrite a newer one.
pub struct QuerySlot<T, E> {
    name: &'static str,
    cache: Arc<QueryCache<T, E>>,
    state: Arc<Mutex<SlotState<T, E>>>,
}

impl<T, E> std::fmt::Debug for QuerySlot<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("QuerySlot")
            .field("name", &self.name)
            .field("key", &state.key)
            .field("generation", &state.generation)
            .field("is_loading", &state.view.is_loading)
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T, E> QuerySlot<T, E> {
    /// Creates an empty slot named `name` (used in log lines).
    #[must_use]
    pub fn new(name: &'static str, cache: Arc<QueryCache<T, E>>) -> Self {
        Self {
            name,
            cache,
            state: Arc::new(Mutex::new(SlotState {
                key: None,
                generation: 0,
                view: QueryState::default(),
            })),
        }
    }

    /// The slot's name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The cache backing this slot, for one-off reads that share its
    /// entries.
    #[must_use]
    pub const fn cache(&self) -> &Arc<QueryCache<T, E>> {
        &self.cache
    }

    /// The key most recently requested.
    #[must_use]
    pub fn key(&self) -> Option<String> {
        lock(&self.state).key.clone()
    }

    /// A copy of what the view currently shows.
    #[must_use]
    pub fn state(&self) -> QueryState<T, E> {
        lock(&self.state).view.clone()
    }
}

impl<T, E> QuerySlot<T, E>
where
    T: Send + Sync + 'static,
    E: Display + Send + Sync + 'static,
{
    /// Requests `key`, keeping the current data visible until it resolves.
    ///
    /// Must be called within a Tokio runtime. The returned handle completes
    /// once the result has been applied or discarded.
    pub fn revalidate<F, Fut>(&self, key: String, fetch: F) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let generation = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.key = Some(key.clone());
            state.view.is_loading = true;
            state.generation
        };

        let name = self.name;
        let cache = Arc::clone(&self.cache);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            let result = cache.get(&key, fetch).await;

            let mut state = lock(&state);
            if state.generation != generation {
                log::debug!(
                    "Discarding {name} result for generation {generation}, now at {}",
                    state.generation
                );
                return;
            }

            state.view.is_loading = false;
            match result {
                Ok(data) => {
                    state.view.data = Some(data);
                    state.view.error = None;
                }
                Err(e) => {
                    log::warn!("{name} failed: {e}");
                    state.view.error = Some(e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::future::{BoxFuture, FutureExt as _};

    use super::*;
    use crate::CachePolicy;

    fn delayed(
        value: u32,
        delay: Duration,
    ) -> impl Fn() -> BoxFuture<'static, Result<u32, String>> + Send + 'static {
        move || {
            async move {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            .boxed()
        }
    }

    fn failing() -> impl Fn() -> BoxFuture<'static, Result<u32, String>> + Send + 'static {
        || async { Err("store unavailable".to_string()) }.boxed()
    }

    fn slot(retry_count: u32) -> QuerySlot<u32, String> {
        let policy = CachePolicy {
            retry_count,
            ..CachePolicy::default()
        };
        QuerySlot::new("test", Arc::new(QueryCache::new(policy)))
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_previous_data_while_loading() {
        let slot = slot(0);
        slot.revalidate("a".to_string(), delayed(1, Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(slot.state().data.as_deref(), Some(&1));

        let pending = slot.revalidate("b".to_string(), delayed(2, Duration::from_secs(1)));
        let state = slot.state();
        assert!(state.is_loading);
        assert_eq!(state.data.as_deref(), Some(&1));

        pending.await.unwrap();
        let state = slot.state();
        assert!(!state.is_loading);
        assert_eq!(state.data.as_deref(), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn latest_request_wins() {
        let slot = slot(0);
        let slow = slot.revalidate("old".to_string(), delayed(1, Duration::from_secs(10)));
        let fast = slot.revalidate("new".to_string(), delayed(2, Duration::from_millis(10)));

        fast.await.unwrap();
        slow.await.unwrap();

        let state = slot.state();
        assert_eq!(state.data.as_deref(), Some(&2));
        assert!(!state.is_loading);
        assert_eq!(slot.key().as_deref(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_last_good_data() {
        let slot = slot(0);
        slot.revalidate("a".to_string(), delayed(1, Duration::ZERO))
            .await
            .unwrap();
        slot.revalidate("b".to_string(), failing()).await.unwrap();

        let state = slot.state();
        assert!(!state.is_loading);
        assert_eq!(state.data.as_deref(), Some(&1));
        assert_eq!(state.error.as_deref().map(String::as_str), Some("store unavailable"));

        slot.revalidate("c".to_string(), delayed(3, Duration::ZERO))
            .await
            .unwrap();
        assert!(slot.state().error.is_none());
    }
}
