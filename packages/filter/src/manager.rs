//! Holder for the single current [`FilterState`].
//!
//! Readers always see a complete state: every update builds the merged
//! state first and then swaps the shared pointer under the write lock.

use std::sync::{Arc, PoisonError, RwLock};

use crate::{FilterPatch, FilterState, YearRange};

/// A filter state together with the revision that produced it.
#[derive(Debug, Clone)]
pub struct FilterSnapshot {
    /// Increases by one on every replacement.
    pub revision: u64,
    /// The state itself.
    pub state: Arc<FilterState>,
}

#[derive(Debug)]
struct Inner {
    current: FilterSnapshot,
    dataset_years: Option<YearRange>,
}

/// Owns the current [`FilterState`].
#[derive(Debug)]
pub struct FilterStateManager {
    inner: RwLock<Inner>,
}

impl Default for FilterStateManager {
    fn default() -> Self {
        Self::new(FilterState::default())
    }
}

impl FilterStateManager {
    /// Creates a manager holding `initial`.
    #[must_use]
    pub fn new(initial: FilterState) -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: FilterSnapshot {
                    revision: 0,
                    state: Arc::new(initial),
                },
                dataset_years: None,
            }),
        }
    }

    /// Returns the current state and its revision.
    #[must_use]
    pub fn snapshot(&self) -> FilterSnapshot {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Returns the current state.
    #[must_use]
    pub fn current(&self) -> Arc<FilterState> {
        self.snapshot().state
    }

    /// Merges `patch` into the current state and returns the new snapshot.
    pub fn update(&self, patch: FilterPatch) -> FilterSnapshot {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let next = inner.current.state.merged(patch);
        Self::replace_locked(&mut inner, next)
    }

    /// Replaces the current state wholesale.
    pub fn replace(&self, state: FilterState) -> FilterSnapshot {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        Self::replace_locked(&mut inner, state)
    }

    /// Restores defaults spanning the dataset's year range, or the fallback
    /// range if the dataset's years are not known yet.
    pub fn reset(&self) -> FilterSnapshot {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let years = inner.dataset_years.unwrap_or_default();
        Self::replace_locked(&mut inner, FilterState::with_years(years))
    }

    /// Records the dataset's actual model-year span for later resets.
    pub fn set_dataset_years(&self, years: YearRange) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .dataset_years = Some(years);
    }

    /// The dataset's model-year span, if known.
    #[must_use]
    pub fn dataset_years(&self) -> Option<YearRange> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .dataset_years
    }

    fn replace_locked(inner: &mut Inner, state: FilterState) -> FilterSnapshot {
        let revision = inner.current.revision + 1;
        log::debug!("Filter state revision {revision}: {state:?}");
        inner.current = FilterSnapshot {
            revision,
            state: Arc::new(state),
        };
        inner.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::EvTypeFilter;

    #[test]
    fn update_bumps_revision_and_merges() {
        let manager = FilterStateManager::default();
        let snap = manager.update(FilterPatch {
            ev_type: Some(EvTypeFilter::Bev),
            ..FilterPatch::default()
        });
        assert_eq!(snap.revision, 1);
        assert_eq!(manager.current().ev_type, EvTypeFilter::Bev);
        assert_eq!(manager.current().years, YearRange::default());
    }

    #[test]
    fn reversed_years_patch_stays_ordered() {
        let manager = FilterStateManager::default();
        manager.update(FilterPatch {
            years: Some(YearRange::new(2022, 2018)),
            ..FilterPatch::default()
        });
        let years = manager.current().years;
        assert!(years.min() <= years.max());
        assert_eq!((years.min(), years.max()), (2018, 2022));
    }

    #[test]
    fn reset_uses_dataset_years_once_known() {
        let manager = FilterStateManager::default();
        manager.update(FilterPatch {
            counties: Some(BTreeSet::from(["King".to_string()])),
            ..FilterPatch::default()
        });

        manager.reset();
        assert_eq!(*manager.current(), FilterState::default());

        manager.set_dataset_years(YearRange::new(1999, 2025));
        let snap = manager.reset();
        assert_eq!(snap.state.years, YearRange::new(1999, 2025));
        assert!(snap.state.counties.is_empty());
        assert_eq!(snap.revision, 3);
    }

    #[test]
    fn earlier_snapshots_are_unaffected_by_updates() {
        let manager = FilterStateManager::default();
        let before = manager.current();
        manager.update(FilterPatch {
            search_query: Some("leaf".to_string()),
            ..FilterPatch::default()
        });
        assert_eq!(before.search_query, "");
        assert_eq!(manager.current().search_query, "leaf");
    }

    #[test]
    fn replace_swaps_whole_state() {
        let manager = FilterStateManager::default();
        manager.update(FilterPatch {
            counties: Some(BTreeSet::from(["King".to_string()])),
            search_query: Some("leaf".to_string()),
            ..FilterPatch::default()
        });

        let snap = manager.replace(FilterState {
            makes: BTreeSet::from(["NISSAN".to_string()]),
            ..FilterState::with_years(YearRange::new(2015, 2020))
        });

        assert_eq!(snap.revision, 2);
        assert!(snap.state.counties.is_empty());
        assert_eq!(snap.state.search_query, "");
        assert_eq!(snap.state.years, YearRange::new(2015, 2020));
        assert_eq!(manager.current(), snap.state);
    }
}
