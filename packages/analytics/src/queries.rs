//! Store-backed queries, one per dashboard view.
//!
//! Each function converts the optional [`FilterState`] into a
//! [`VehicleQuery`], retrieves the matching records, and reduces them with
//! [`crate::aggregate`]. `None` means "no filters". Failures are logged and
//! propagated so the caller can decide how to present them.

use ev_dashboard_analytics_models::{
    CafvBucket, CountyCount, DashboardMetrics, FilterOptions, MakeShare, ModelCount, RangeBucket,
    VehiclePage, YearlyCount,
};
use ev_dashboard_database::VehicleStore;
use ev_dashboard_database_models::{PageWindow, VehicleField, VehicleQuery};
use ev_dashboard_filter::FilterState;
use ev_dashboard_vehicle_models::VehicleRecord;

use crate::{AnalyticsError, aggregate};

/// Rows returned by the county and make distributions.
pub const DEFAULT_DISTRIBUTION_LIMIT: usize = 10;

/// Rows returned by the top-models ranking.
pub const DEFAULT_TOP_MODELS_LIMIT: usize = 20;

/// Page size used when the caller asks for zero rows per page.
pub const DEFAULT_PAGE_SIZE: u64 = 100;

/// Builds the store predicate for `filters`.
///
/// The free-text search only narrows the vehicle table, so it is included
/// only when `with_search` is set.
#[must_use]
pub fn vehicle_query(filters: Option<&FilterState>, with_search: bool) -> VehicleQuery {
    let Some(filters) = filters else {
        return VehicleQuery::all();
    };

    VehicleQuery {
        counties: filters.counties.iter().cloned().collect(),
        years: Some((filters.years.min(), filters.years.max())),
        makes: filters.makes.iter().cloned().collect(),
        ev_class: filters.ev_type.class(),
        search: if with_search {
            filters.search_term().map(str::to_string)
        } else {
            None
        },
        fields: Vec::new(),
    }
}

/// Retrieves the records matching `filters`, filling only `fields`.
async fn fetch_filtered(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
    fields: &[VehicleField],
    what: &str,
) -> Result<Vec<VehicleRecord>, AnalyticsError> {
    let query = VehicleQuery {
        fields: fields.to_vec(),
        ..vehicle_query(filters, false)
    };
    let records = store.fetch(&query).await.map_err(|e| {
        log::error!("Error fetching {what}: {e}");
        AnalyticsError::from(e)
    })?;
    log::debug!("{what}: {} matching records", records.len());
    Ok(records)
}

/// Headline metrics over every record matching `filters`.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn dashboard_metrics(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
) -> Result<DashboardMetrics, AnalyticsError> {
    let records = fetch_filtered(
        store,
        filters,
        &[
            VehicleField::County,
            VehicleField::Make,
            VehicleField::ModelYear,
            VehicleField::EvType,
            VehicleField::ElectricRange,
        ],
        "dashboard metrics",
    )
    .await?;
    Ok(aggregate::dashboard_metrics(&records))
}

/// The `limit` counties with the most matching records.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn county_distribution(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
    limit: usize,
) -> Result<Vec<CountyCount>, AnalyticsError> {
    let records =
        fetch_filtered(store, filters, &[VehicleField::County], "county distribution").await?;
    Ok(aggregate::county_distribution(&records, limit))
}

/// The `limit` makes with the most matching records, plus an `"Others"` row.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn make_distribution(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
    limit: usize,
) -> Result<Vec<MakeShare>, AnalyticsError> {
    let records = fetch_filtered(store, filters, &[VehicleField::Make], "make distribution").await?;
    Ok(aggregate::make_distribution(&records, limit))
}

/// BEV/PHEV counts per model year, ascending.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn yearly_trends(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
) -> Result<Vec<YearlyCount>, AnalyticsError> {
    let records = fetch_filtered(
        store,
        filters,
        &[VehicleField::ModelYear, VehicleField::EvType],
        "yearly trends",
    )
    .await?;
    Ok(aggregate::yearly_trends(&records))
}

/// Matching records bucketed by electric range.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn range_distribution(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
) -> Result<Vec<RangeBucket>, AnalyticsError> {
    let records =
        fetch_filtered(store, filters, &[VehicleField::ElectricRange], "range distribution").await?;
    Ok(aggregate::range_distribution(&records))
}

/// Matching records grouped by CAFV eligibility status.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn cafv_eligibility(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
) -> Result<Vec<CafvBucket>, AnalyticsError> {
    let records =
        fetch_filtered(store, filters, &[VehicleField::CafvEligibility], "CAFV eligibility").await?;
    Ok(aggregate::cafv_breakdown(&records))
}

/// The `limit` most common make/model pairs.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn top_models(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
    limit: usize,
) -> Result<Vec<ModelCount>, AnalyticsError> {
    let records = fetch_filtered(
        store,
        filters,
        &[VehicleField::Make, VehicleField::Model],
        "top models",
    )
    .await?;
    Ok(aggregate::top_models(&records, limit))
}

/// One page of matching records for the table, including the text search.
///
/// `page` is 1-indexed (0 is treated as 1); a `page_size` of 0 falls back to
/// [`DEFAULT_PAGE_SIZE`].
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the page cannot be retrieved.
pub async fn vehicles(
    store: &dyn VehicleStore,
    filters: Option<&FilterState>,
    page: u64,
    page_size: u64,
) -> Result<VehiclePage, AnalyticsError> {
    let page = page.max(1);
    let page_size = if page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    };

    let query = vehicle_query(filters, true);
    let slice = store
        .fetch_page(&query, PageWindow::for_page(page, page_size))
        .await
        .map_err(|e| {
            log::error!("Error fetching vehicles: {e}");
            AnalyticsError::from(e)
        })?;

    Ok(VehiclePage {
        vehicles: slice.rows,
        total: slice.total,
        page,
        page_size,
        total_pages: aggregate::total_pages(slice.total, page_size),
    })
}

/// Counties, makes, and model-year span available to the filter panel.
///
/// Always computed over the whole dataset.
///
/// # Errors
///
/// Returns [`AnalyticsError::Store`] if the records cannot be retrieved.
pub async fn filter_options(store: &dyn VehicleStore) -> Result<FilterOptions, AnalyticsError> {
    let records = fetch_filtered(
        store,
        None,
        &[VehicleField::County, VehicleField::Make, VehicleField::ModelYear],
        "filter options",
    )
    .await?;
    Ok(aggregate::filter_options(&records))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use ev_dashboard_database::{DbError, memory::MemoryVehicleStore};
    use ev_dashboard_database_models::VehicleSlice;
    use ev_dashboard_filter::{EvTypeFilter, YearRange};
    use ev_dashboard_vehicle_models::EvType;

    use super::*;

    fn record(
        id: i64,
        county: &str,
        make: &str,
        model: &str,
        year: i32,
        ev_type: EvType,
    ) -> VehicleRecord {
        VehicleRecord {
            id,
            vin: format!("VIN{id:07}"),
            county: county.to_string(),
            city: "Seattle".to_string(),
            make: make.to_string(),
            model: model.to_string(),
            model_year: Some(year),
            ev_type,
            electric_range: 200,
            ..VehicleRecord::default()
        }
    }

    /// 120 BEV and 30 PHEV; King holds 100 of them.
    fn fixture() -> MemoryVehicleStore {
        let mut records = Vec::new();
        let mut id = 0;
        for i in 0..150 {
            id += 1;
            let county = if i < 100 { "King" } else { "Pierce" };
            let (make, model, ev_type) = if i < 120 {
                ("TESLA", "MODEL 3", EvType::BatteryElectric)
            } else {
                ("BMW", "X5", EvType::PlugInHybrid)
            };
            let year = if i % 2 == 0 { 2023 } else { 2024 };
            records.push(record(id, county, make, model, year, ev_type));
        }
        MemoryVehicleStore::new(records)
    }

    struct FailingStore;

    #[async_trait]
    impl VehicleStore for FailingStore {
        async fn fetch(&self, _query: &VehicleQuery) -> Result<Vec<VehicleRecord>, DbError> {
            Err(DbError::Conversion {
                message: "connection refused".to_string(),
            })
        }

        async fn fetch_page(
            &self,
            _query: &VehicleQuery,
            _window: PageWindow,
        ) -> Result<VehicleSlice, DbError> {
            Err(DbError::Conversion {
                message: "connection refused".to_string(),
            })
        }
    }

    /// Records the field projection of every query it serves.
    struct RecordingStore {
        inner: MemoryVehicleStore,
        seen: std::sync::Mutex<Vec<Vec<VehicleField>>>,
    }

    #[async_trait]
    impl VehicleStore for RecordingStore {
        async fn fetch(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, DbError> {
            self.seen.lock().unwrap().push(query.fields.clone());
            self.inner.fetch(query).await
        }

        async fn fetch_page(
            &self,
            query: &VehicleQuery,
            window: PageWindow,
        ) -> Result<VehicleSlice, DbError> {
            self.seen.lock().unwrap().push(query.fields.clone());
            self.inner.fetch_page(query, window).await
        }
    }

    #[tokio::test]
    async fn views_request_only_the_columns_they_read() {
        let store = RecordingStore {
            inner: fixture(),
            seen: std::sync::Mutex::new(Vec::new()),
        };

        let counties = county_distribution(&store, None, 10).await.unwrap();
        assert_eq!(counties[0].county, "King");
        top_models(&store, None, 5).await.unwrap();
        vehicles(&store, None, 1, 10).await.unwrap();

        let seen = store.seen.lock().unwrap();
        assert_eq!(seen[0], vec![VehicleField::County]);
        assert_eq!(seen[1], vec![VehicleField::Make, VehicleField::Model]);
        assert!(seen[2].is_empty());
    }

    #[test]
    fn no_filters_is_unrestricted() {
        assert_eq!(vehicle_query(None, true), VehicleQuery::all());
    }

    #[test]
    fn search_only_reaches_table_query() {
        let filters = FilterState {
            search_query: "  leaf ".to_string(),
            ..FilterState::default()
        };
        assert_eq!(vehicle_query(Some(&filters), false).search, None);
        assert_eq!(
            vehicle_query(Some(&filters), true).search.as_deref(),
            Some("leaf")
        );
    }

    #[tokio::test]
    async fn metrics_split_bev_and_phev() {
        let store = fixture();
        let metrics = dashboard_metrics(&store, None).await.unwrap();
        assert_eq!(metrics.total_vehicles, 150);
        assert_eq!(metrics.bev_count, 120);
        assert_eq!(metrics.phev_count, 30);
        assert_eq!(metrics.top_county, "King");
        assert_eq!(metrics.top_make, "TESLA");
        assert_eq!(metrics.avg_electric_range, 200);
    }

    #[tokio::test]
    async fn ev_type_filter_narrows_every_view() {
        let store = fixture();
        let filters = FilterState {
            ev_type: EvTypeFilter::Phev,
            years: YearRange::new(2012, 2024),
            ..FilterState::default()
        };
        let metrics = dashboard_metrics(&store, Some(&filters)).await.unwrap();
        assert_eq!(metrics.total_vehicles, 30);
        assert_eq!(metrics.bev_count, 0);

        let models = top_models(&store, Some(&filters), DEFAULT_TOP_MODELS_LIMIT)
            .await
            .unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].model, "BMW X5");
    }

    #[tokio::test]
    async fn county_filter_applies_to_distributions() {
        let store = fixture();
        let filters = FilterState {
            counties: BTreeSet::from(["Pierce".to_string()]),
            years: YearRange::new(2012, 2024),
            ..FilterState::default()
        };
        let counties = county_distribution(&store, Some(&filters), DEFAULT_DISTRIBUTION_LIMIT)
            .await
            .unwrap();
        assert_eq!(counties.len(), 1);
        assert_eq!(counties[0].county, "Pierce");
        assert_eq!(counties[0].count, 50);

        let makes = make_distribution(&store, Some(&filters), DEFAULT_DISTRIBUTION_LIMIT)
            .await
            .unwrap();
        let sum: f64 = makes.iter().map(|m| m.percentage).sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn year_range_with_no_matches_yields_empty_views() {
        let store = fixture();
        let filters = FilterState::with_years(YearRange::new(2000, 2005));
        assert!(yearly_trends(&store, Some(&filters)).await.unwrap().is_empty());
        assert!(cafv_eligibility(&store, Some(&filters)).await.unwrap().is_empty());
        let buckets = range_distribution(&store, Some(&filters)).await.unwrap();
        assert!(buckets.iter().all(|b| b.count == 0));
        let metrics = dashboard_metrics(&store, Some(&filters)).await.unwrap();
        assert_eq!(metrics.total_vehicles, 0);
    }

    #[tokio::test]
    async fn vehicles_paginate_with_search() {
        let store = fixture();
        let page = vehicles(&store, None, 2, 40).await.unwrap();
        assert_eq!(page.total, 150);
        assert_eq!(page.total_pages, 4);
        assert_eq!(page.vehicles.len(), 40);
        assert_eq!(page.vehicles[0].id, 41);

        let filters = FilterState {
            search_query: "x5".to_string(),
            years: YearRange::new(2012, 2024),
            ..FilterState::default()
        };
        let page = vehicles(&store, Some(&filters), 0, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.total, 30);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn filter_options_cover_whole_dataset() {
        let store = fixture();
        let options = filter_options(&store).await.unwrap();
        assert_eq!(options.counties, vec!["King", "Pierce"]);
        assert_eq!(options.makes, vec!["BMW", "TESLA"]);
        assert_eq!(options.years.min, 2023);
        assert_eq!(options.years.max, 2024);
    }

    #[tokio::test]
    async fn store_failures_propagate() {
        let store = FailingStore;
        assert!(matches!(
            dashboard_metrics(&store, None).await,
            Err(AnalyticsError::Store(_))
        ));
        assert!(vehicles(&store, None, 1, 10).await.is_err());
        assert!(filter_options(&store).await.is_err());
    }
}
