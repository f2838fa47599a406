//! In-memory [`VehicleStore`].
//!
//! Holds an immutable record set and evaluates [`VehicleQuery::matches`]
//! against it. Records are already complete, so a query's field projection
//! is ignored. Used when the dashboard is served straight from the dataset
//! CSV, and by tests throughout the workspace.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ev_dashboard_database_models::{PageWindow, VehicleQuery, VehicleSlice};
use ev_dashboard_vehicle_models::VehicleRecord;

use crate::csv_source::load_vehicles_csv;
use crate::{DbError, VehicleStore};

/// Read-only record set shared behind an [`Arc`].
#[derive(Debug, Clone, Default)]
pub struct MemoryVehicleStore {
    records: Arc<[VehicleRecord]>,
}

impl MemoryVehicleStore {
    /// Creates a store over `records`.
    #[must_use]
    pub fn new(records: Vec<VehicleRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Loads the dataset CSV at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the file cannot be read.
    pub async fn from_csv(path: &Path) -> Result<Self, DbError> {
        let load = load_vehicles_csv(path).await?;
        Ok(Self::new(load.records))
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl VehicleStore for MemoryVehicleStore {
    async fn fetch(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, DbError> {
        Ok(self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect())
    }

    async fn fetch_page(
        &self,
        query: &VehicleQuery,
        window: PageWindow,
    ) -> Result<VehicleSlice, DbError> {
        let mut matching: Vec<&VehicleRecord> =
            self.records.iter().filter(|r| query.matches(r)).collect();
        matching.sort_by_key(|r| r.id);

        let total = matching.len() as u64;
        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(window.limit).unwrap_or(usize::MAX);

        Ok(VehicleSlice {
            rows: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            total,
        })
    }
}
