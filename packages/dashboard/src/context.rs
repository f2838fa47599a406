//! The dashboard context: filter state plus one cached slot per view.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ev_dashboard_analytics::{AnalyticsError, queries};
use ev_dashboard_analytics_models::{
    CafvBucket, CountyCount, DashboardMetrics, FilterOptions, MakeShare, ModelCount, RangeBucket,
    VehiclePage, YearlyCount,
};
use ev_dashboard_cache::{QueryCache, QuerySlot, QueryState, SharedResult};
use ev_dashboard_database::VehicleStore;
use ev_dashboard_filter::manager::{FilterSnapshot, FilterStateManager};
use ev_dashboard_filter::{FilterPatch, FilterState, YearRange};
use futures::future::{BoxFuture, FutureExt as _};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};
use tokio::task::JoinHandle;

use crate::{DashboardConfig, DashboardError, export};

/// Table page size used when the configured size is 0.
pub const DEFAULT_TABLE_PAGE_SIZE: u64 = 50;

type Fetch<T> = BoxFuture<'static, Result<T, AnalyticsError>>;
type Fetcher<T> = Box<dyn Fn() -> Fetch<T> + Send>;
type Slot<T> = QuerySlot<T, AnalyticsError>;

/// One region of the dashboard, backed by its own query slot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DashboardView {
    Metrics,
    Counties,
    Makes,
    Yearly,
    Range,
    Cafv,
    TopModels,
    Vehicles,
    FilterOptions,
}

impl DashboardView {
    /// Whether the view depends on the filter state.
    #[must_use]
    pub const fn is_filtered(self) -> bool {
        !matches!(self, Self::FilterOptions)
    }
}

/// Serializable form of one view's [`QueryState`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState<T> {
    /// Last successful result.
    pub data: Option<T>,
    /// A newer request has not settled yet.
    pub is_loading: bool,
    /// Most recent failure message.
    pub error: Option<String>,
}

impl<T: Clone> ViewState<T> {
    fn from_query(state: QueryState<T, AnalyticsError>) -> Self {
        Self {
            data: state.data.map(|data| (*data).clone()),
            is_loading: state.is_loading,
            error: state.error.map(|e| e.to_string()),
        }
    }

    fn map_data(self, f: impl FnOnce(T) -> T) -> Self {
        Self {
            data: self.data.map(f),
            ..self
        }
    }
}

/// Everything the dashboard currently shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    /// Revision of [`Self::filters`].
    pub revision: u64,
    /// The filter state the views were requested for.
    pub filters: FilterState,
    /// Current table page.
    pub page: u64,
    pub metrics: ViewState<DashboardMetrics>,
    pub counties: ViewState<Vec<CountyCount>>,
    pub makes: ViewState<Vec<MakeShare>>,
    pub yearly: ViewState<Vec<YearlyCount>>,
    pub range: ViewState<Vec<RangeBucket>>,
    pub cafv: ViewState<Vec<CafvBucket>>,
    /// Truncated to the configured display count.
    pub top_models: ViewState<Vec<ModelCount>>,
    pub vehicles: ViewState<VehiclePage>,
    pub filter_options: ViewState<FilterOptions>,
}

/// A cache key and the fetch that fills it.
struct Request<T> {
    key: String,
    fetch: Fetcher<T>,
}

fn view_key(view: DashboardView, filters: &FilterState) -> String {
    format!("{view}:{}", filters.cache_key())
}

fn new_slot<T>(view: DashboardView, config: &DashboardConfig) -> Slot<T> {
    QuerySlot::new(view.into(), Arc::new(QueryCache::new(config.cache_policy())))
}

/// Waits for revalidation tasks to finish.
pub async fn settle(handles: Vec<JoinHandle<()>>) {
    for result in futures::future::join_all(handles).await {
        if let Err(e) = result {
            log::error!("Dashboard view task failed: {e}");
        }
    }
}

/// Shared dashboard state, passed explicitly to whoever renders it.
///
/// Methods that change what is shown return the spawned revalidation tasks;
/// callers that need the new results await them with [`settle`].
pub struct DashboardContext {
    store: Arc<dyn VehicleStore>,
    config: DashboardConfig,
    filters: FilterStateManager,
    page: AtomicU64,
    metrics: Slot<DashboardMetrics>,
    counties: Slot<Vec<CountyCount>>,
    makes: Slot<Vec<MakeShare>>,
    yearly: Slot<Vec<YearlyCount>>,
    range: Slot<Vec<RangeBucket>>,
    cafv: Slot<Vec<CafvBucket>>,
    top_models: Slot<Vec<ModelCount>>,
    vehicles: Slot<VehiclePage>,
    filter_options: Slot<FilterOptions>,
}

impl std::fmt::Debug for DashboardContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardContext")
            .field("config", &self.config)
            .field("filters", &self.filters)
            .field("page", &self.page)
            .finish_non_exhaustive()
    }
}

impl DashboardContext {
    /// Creates a context over `store` with default filters and empty views.
    #[must_use]
    pub fn new(store: Arc<dyn VehicleStore>, config: DashboardConfig) -> Self {
        Self {
            metrics: new_slot(DashboardView::Metrics, &config),
            counties: new_slot(DashboardView::Counties, &config),
            makes: new_slot(DashboardView::Makes, &config),
            yearly: new_slot(DashboardView::Yearly, &config),
            range: new_slot(DashboardView::Range, &config),
            cafv: new_slot(DashboardView::Cafv, &config),
            top_models: new_slot(DashboardView::TopModels, &config),
            vehicles: new_slot(DashboardView::Vehicles, &config),
            filter_options: new_slot(DashboardView::FilterOptions, &config),
            store,
            config,
            filters: FilterStateManager::default(),
            page: AtomicU64::new(1),
        }
    }

    /// The context's settings.
    #[must_use]
    pub const fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<dyn VehicleStore> {
        &self.store
    }

    /// The current filter state.
    #[must_use]
    pub fn filters(&self) -> Arc<FilterState> {
        self.filters.current()
    }

    /// The current filter state and its revision.
    #[must_use]
    pub fn filter_snapshot(&self) -> FilterSnapshot {
        self.filters.snapshot()
    }

    /// Year span new filter states start from: the dataset's once known,
    /// the fallback range before that.
    #[must_use]
    pub fn default_years(&self) -> YearRange {
        self.filters.dataset_years().unwrap_or_default()
    }

    /// Current 1-indexed table page.
    #[must_use]
    pub fn page(&self) -> u64 {
        self.page.load(Ordering::SeqCst)
    }

    /// Rows per table page.
    #[must_use]
    pub const fn page_size(&self) -> u64 {
        if self.config.page_size == 0 {
            DEFAULT_TABLE_PAGE_SIZE
        } else {
            self.config.page_size
        }
    }

    /// Loads the filter options, adopts the dataset's year span as the
    /// default range, resets the filters, and starts loading every view.
    ///
    /// If the options cannot be loaded the fallback year range is kept.
    pub async fn initialize(&self) -> Vec<JoinHandle<()>> {
        settle(vec![self.revalidate(DashboardView::FilterOptions)]).await;

        match self.filter_options.state().data {
            Some(options) => {
                log::info!(
                    "Dataset spans model years {}-{}",
                    options.years.min,
                    options.years.max
                );
                self.filters
                    .set_dataset_years(YearRange::new(options.years.min, options.years.max));
            }
            None => log::warn!("Filter options unavailable, keeping default year range"),
        }

        self.filters.reset();
        self.page.store(1, Ordering::SeqCst);
        self.refresh()
    }

    /// Merges `patch` into the filters, returns the table to page 1, and
    /// revalidates every filtered view.
    pub fn update_filters(&self, patch: FilterPatch) -> Vec<JoinHandle<()>> {
        let snapshot = self.filters.update(patch);
        log::debug!("Filters updated to revision {}", snapshot.revision);
        self.page.store(1, Ordering::SeqCst);
        self.refresh()
    }

    /// Replaces the filters wholesale, returns the table to page 1, and
    /// revalidates every filtered view.
    pub fn replace_filters(&self, state: FilterState) -> Vec<JoinHandle<()>> {
        let snapshot = self.filters.replace(state);
        log::debug!("Filters replaced at revision {}", snapshot.revision);
        self.page.store(1, Ordering::SeqCst);
        self.refresh()
    }

    /// Restores the default filters and revalidates every filtered view.
    pub fn reset_filters(&self) -> Vec<JoinHandle<()>> {
        self.filters.reset();
        self.page.store(1, Ordering::SeqCst);
        self.refresh()
    }

    /// Moves the table to `page` (0 is treated as 1).
    pub fn set_page(&self, page: u64) -> JoinHandle<()> {
        self.page.store(page.max(1), Ordering::SeqCst);
        self.revalidate(DashboardView::Vehicles)
    }

    /// Revalidates every view that depends on the filters.
    pub fn refresh(&self) -> Vec<JoinHandle<()>> {
        DashboardView::iter()
            .filter(|view| view.is_filtered())
            .map(|view| self.revalidate(view))
            .collect()
    }

    /// Revalidates a single view for the current filters. Also serves as
    /// the per-view retry after a failure.
    pub fn revalidate(&self, view: DashboardView) -> JoinHandle<()> {
        let filters = self.filters.current();
        match view {
            DashboardView::Metrics => spawn(&self.metrics, self.metrics_request(filters)),
            DashboardView::Counties => spawn(&self.counties, self.counties_request(filters)),
            DashboardView::Makes => spawn(&self.makes, self.makes_request(filters)),
            DashboardView::Yearly => spawn(&self.yearly, self.yearly_request(filters)),
            DashboardView::Range => spawn(&self.range, self.range_request(filters)),
            DashboardView::Cafv => spawn(&self.cafv, self.cafv_request(filters)),
            DashboardView::TopModels => spawn(&self.top_models, self.top_models_request(filters)),
            DashboardView::Vehicles => {
                spawn(&self.vehicles, self.vehicles_request(filters, self.page()))
            }
            DashboardView::FilterOptions => {
                spawn(&self.filter_options, self.filter_options_request())
            }
        }
    }

    /// Everything currently shown.
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        let FilterSnapshot { revision, state } = self.filters.snapshot();
        let display = self.config.top_models_display;

        DashboardSnapshot {
            revision,
            filters: (*state).clone(),
            page: self.page(),
            metrics: ViewState::from_query(self.metrics.state()),
            counties: ViewState::from_query(self.counties.state()),
            makes: ViewState::from_query(self.makes.state()),
            yearly: ViewState::from_query(self.yearly.state()),
            range: ViewState::from_query(self.range.state()),
            cafv: ViewState::from_query(self.cafv.state()),
            top_models: ViewState::from_query(self.top_models.state()).map_data(|mut models| {
                models.truncate(display);
                models
            }),
            vehicles: ViewState::from_query(self.vehicles.state()),
            filter_options: ViewState::from_query(self.filter_options.state()),
        }
    }

    /// CSV of the table page currently shown, or `None` before the first
    /// page has loaded.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError`] if the CSV cannot be written.
    pub fn export_page_csv(&self) -> Result<Option<String>, DashboardError> {
        self.vehicles
            .state()
            .data
            .map(|page| export::vehicles_to_csv(&page.vehicles))
            .transpose()
    }

    /// Headline metrics for `filters`, sharing the metrics view's cache.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn metrics(
        &self,
        filters: &FilterState,
    ) -> SharedResult<DashboardMetrics, AnalyticsError> {
        fetch(&self.metrics, self.metrics_request(Arc::new(filters.clone()))).await
    }

    /// County distribution for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn county_distribution(
        &self,
        filters: &FilterState,
    ) -> SharedResult<Vec<CountyCount>, AnalyticsError> {
        fetch(&self.counties, self.counties_request(Arc::new(filters.clone()))).await
    }

    /// Make distribution for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn make_distribution(
        &self,
        filters: &FilterState,
    ) -> SharedResult<Vec<MakeShare>, AnalyticsError> {
        fetch(&self.makes, self.makes_request(Arc::new(filters.clone()))).await
    }

    /// Yearly BEV/PHEV trend for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn yearly_trends(
        &self,
        filters: &FilterState,
    ) -> SharedResult<Vec<YearlyCount>, AnalyticsError> {
        fetch(&self.yearly, self.yearly_request(Arc::new(filters.clone()))).await
    }

    /// Range distribution for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn range_distribution(
        &self,
        filters: &FilterState,
    ) -> SharedResult<Vec<RangeBucket>, AnalyticsError> {
        fetch(&self.range, self.range_request(Arc::new(filters.clone()))).await
    }

    /// CAFV eligibility breakdown for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn cafv_eligibility(
        &self,
        filters: &FilterState,
    ) -> SharedResult<Vec<CafvBucket>, AnalyticsError> {
        fetch(&self.cafv, self.cafv_request(Arc::new(filters.clone()))).await
    }

    /// Top make/model ranking for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn top_models(
        &self,
        filters: &FilterState,
    ) -> SharedResult<Vec<ModelCount>, AnalyticsError> {
        fetch(&self.top_models, self.top_models_request(Arc::new(filters.clone()))).await
    }

    /// One table page for `filters`.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn vehicles(
        &self,
        filters: &FilterState,
        page: u64,
    ) -> SharedResult<VehiclePage, AnalyticsError> {
        fetch(
            &self.vehicles,
            self.vehicles_request(Arc::new(filters.clone()), page.max(1)),
        )
        .await
    }

    /// Filter panel options over the whole dataset.
    ///
    /// # Errors
    ///
    /// Returns the store failure once retries are exhausted.
    pub async fn filter_options(&self) -> SharedResult<FilterOptions, AnalyticsError> {
        fetch(&self.filter_options, self.filter_options_request()).await
    }

    fn request<T, F, Fut>(&self, key: String, filters: Arc<FilterState>, query: F) -> Request<T>
    where
        F: Fn(Arc<dyn VehicleStore>, Arc<FilterState>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, AnalyticsError>> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        Request {
            key,
            fetch: Box::new(move || query(Arc::clone(&store), Arc::clone(&filters)).boxed()),
        }
    }

    fn metrics_request(&self, filters: Arc<FilterState>) -> Request<DashboardMetrics> {
        let key = view_key(DashboardView::Metrics, &filters);
        self.request(key, filters, |store, f| async move {
            queries::dashboard_metrics(store.as_ref(), Some(&f)).await
        })
    }

    fn counties_request(&self, filters: Arc<FilterState>) -> Request<Vec<CountyCount>> {
        let key = view_key(DashboardView::Counties, &filters);
        let limit = self.config.county_limit;
        self.request(key, filters, move |store, f| async move {
            queries::county_distribution(store.as_ref(), Some(&f), limit).await
        })
    }

    fn makes_request(&self, filters: Arc<FilterState>) -> Request<Vec<MakeShare>> {
        let key = view_key(DashboardView::Makes, &filters);
        let limit = self.config.make_limit;
        self.request(key, filters, move |store, f| async move {
            queries::make_distribution(store.as_ref(), Some(&f), limit).await
        })
    }

    fn yearly_request(&self, filters: Arc<FilterState>) -> Request<Vec<YearlyCount>> {
        let key = view_key(DashboardView::Yearly, &filters);
        self.request(key, filters, |store, f| async move {
            queries::yearly_trends(store.as_ref(), Some(&f)).await
        })
    }

    fn range_request(&self, filters: Arc<FilterState>) -> Request<Vec<RangeBucket>> {
        let key = view_key(DashboardView::Range, &filters);
        self.request(key, filters, |store, f| async move {
            queries::range_distribution(store.as_ref(), Some(&f)).await
        })
    }

    fn cafv_request(&self, filters: Arc<FilterState>) -> Request<Vec<CafvBucket>> {
        let key = view_key(DashboardView::Cafv, &filters);
        self.request(key, filters, |store, f| async move {
            queries::cafv_eligibility(store.as_ref(), Some(&f)).await
        })
    }

    fn top_models_request(&self, filters: Arc<FilterState>) -> Request<Vec<ModelCount>> {
        let key = view_key(DashboardView::TopModels, &filters);
        let limit = self.config.top_models_limit;
        self.request(key, filters, move |store, f| async move {
            queries::top_models(store.as_ref(), Some(&f), limit).await
        })
    }

    fn vehicles_request(&self, filters: Arc<FilterState>, page: u64) -> Request<VehiclePage> {
        let page_size = self.page_size();
        let key = format!(
            "{}:page={page}:size={page_size}",
            view_key(DashboardView::Vehicles, &filters)
        );
        self.request(key, filters, move |store, f| async move {
            queries::vehicles(store.as_ref(), Some(&f), page, page_size).await
        })
    }

    fn filter_options_request(&self) -> Request<FilterOptions> {
        let filters = Arc::new(FilterState::default());
        self.request(
            DashboardView::FilterOptions.to_string(),
            filters,
            |store, _| async move { queries::filter_options(store.as_ref()).await },
        )
    }
}

fn spawn<T>(slot: &Slot<T>, request: Request<T>) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    slot.revalidate(request.key, request.fetch)
}

async fn fetch<T>(slot: &Slot<T>, request: Request<T>) -> SharedResult<T, AnalyticsError>
where
    T: Send + Sync + 'static,
{
    slot.cache().get(&request.key, request.fetch).await
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;
    use ev_dashboard_database::DbError;
    use ev_dashboard_database::memory::MemoryVehicleStore;
    use ev_dashboard_database_models::{PageWindow, VehicleQuery, VehicleSlice};
    use ev_dashboard_filter::EvTypeFilter;
    use ev_dashboard_vehicle_models::{EvType, VehicleRecord};

    use super::*;

    /// 120 BEV and 30 PHEV split over 2022 and 2023; King holds 100.
    fn records() -> Vec<VehicleRecord> {
        (0..150)
            .map(|i| {
                let (make, model, ev_type) = if i < 120 {
                    ("TESLA", format!("MODEL {}", i % 20), EvType::BatteryElectric)
                } else {
                    ("TOYOTA", "PRIUS PRIME".to_string(), EvType::PlugInHybrid)
                };
                VehicleRecord {
                    id: i + 1,
                    vin: format!("VIN{i:07}"),
                    county: if i < 100 { "King" } else { "Pierce" }.to_string(),
                    city: "Seattle".to_string(),
                    make: make.to_string(),
                    model,
                    model_year: Some(if i % 2 == 0 { 2023 } else { 2022 }),
                    ev_type,
                    electric_range: 100,
                    ..VehicleRecord::default()
                }
            })
            .collect()
    }

    fn context(store: Arc<dyn VehicleStore>) -> DashboardContext {
        let config = DashboardConfig {
            error_retry_count: 0,
            ..DashboardConfig::default()
        };
        DashboardContext::new(store, config)
    }

    fn memory_context() -> DashboardContext {
        context(Arc::new(MemoryVehicleStore::new(records())))
    }

    /// Full scans fail, paged reads succeed.
    struct ScanFailsStore(MemoryVehicleStore);

    #[async_trait]
    impl VehicleStore for ScanFailsStore {
        async fn fetch(&self, _query: &VehicleQuery) -> Result<Vec<VehicleRecord>, DbError> {
            Err(DbError::Conversion {
                message: "scan timed out".to_string(),
            })
        }

        async fn fetch_page(
            &self,
            query: &VehicleQuery,
            window: PageWindow,
        ) -> Result<VehicleSlice, DbError> {
            self.0.fetch_page(query, window).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initialize_adopts_dataset_years_and_loads_views() {
        let ctx = memory_context();
        settle(ctx.initialize().await).await;

        assert_eq!(ctx.filters().years, YearRange::new(2022, 2023));

        let snap = ctx.snapshot();
        let metrics = snap.metrics.data.unwrap();
        assert_eq!(metrics.total_vehicles, 150);
        assert_eq!(metrics.top_county, "King");
        assert!(!snap.metrics.is_loading);
        assert_eq!(snap.filter_options.data.unwrap().counties, vec!["King", "Pierce"]);
        assert_eq!(snap.counties.data.unwrap()[0].county, "King");

        let page = snap.vehicles.data.unwrap();
        assert_eq!(page.page_size, 50);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn bev_filter_for_single_year() {
        let same_year = records()
            .into_iter()
            .map(|r| VehicleRecord {
                model_year: Some(2023),
                ..r
            })
            .collect();
        let ctx = context(Arc::new(MemoryVehicleStore::new(same_year)));

        settle(ctx.update_filters(FilterPatch {
            ev_type: Some(EvTypeFilter::Bev),
            years: Some(YearRange::new(2023, 2023)),
            ..FilterPatch::default()
        }))
        .await;

        let metrics = ctx.snapshot().metrics.data.unwrap();
        assert_eq!(metrics.total_vehicles, 120);
        assert_eq!(metrics.bev_count, 120);
        assert_eq!(metrics.phev_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn previous_data_stays_visible_while_loading() {
        let ctx = memory_context();
        settle(ctx.initialize().await).await;

        let handles = ctx.update_filters(FilterPatch {
            counties: Some(BTreeSet::from(["Pierce".to_string()])),
            ..FilterPatch::default()
        });
        let loading = ctx.snapshot();
        assert!(loading.metrics.is_loading);
        assert_eq!(loading.metrics.data.unwrap().total_vehicles, 150);

        settle(handles).await;
        let loaded = ctx.snapshot();
        assert!(!loaded.metrics.is_loading);
        assert_eq!(loaded.metrics.data.unwrap().total_vehicles, 50);
        assert_eq!(loaded.revision, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_view_does_not_blank_others() {
        let store = ScanFailsStore(MemoryVehicleStore::new(records()));
        let ctx = context(Arc::new(store));
        settle(ctx.initialize().await).await;

        let snap = ctx.snapshot();
        assert!(snap.metrics.data.is_none());
        assert!(snap.metrics.error.unwrap().contains("scan timed out"));
        assert!(snap.filter_options.error.is_some());
        assert_eq!(ctx.filters().years, YearRange::default());

        assert!(snap.vehicles.error.is_none());
        assert_eq!(snap.vehicles.data.unwrap().total, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn page_changes_and_filter_updates_reset_it() {
        let ctx = memory_context();
        settle(ctx.initialize().await).await;

        ctx.set_page(3).await.unwrap();
        let page = ctx.snapshot().vehicles.data.unwrap();
        assert_eq!(page.page, 3);
        assert_eq!(page.vehicles.len(), 50);
        assert_eq!(page.vehicles[0].id, 101);

        settle(ctx.update_filters(FilterPatch {
            search_query: Some("prius".to_string()),
            ..FilterPatch::default()
        }))
        .await;
        let snap = ctx.snapshot();
        assert_eq!(snap.page, 1);
        let page = snap.vehicles.data.unwrap();
        assert_eq!(page.total, 30);
        assert_eq!(page.total_pages, 1);
        // Search narrows only the table.
        assert_eq!(snap.metrics.data.unwrap().total_vehicles, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn top_models_are_truncated_for_display() {
        let ctx = memory_context();
        settle(ctx.initialize().await).await;

        let snap = ctx.snapshot();
        assert_eq!(snap.top_models.data.unwrap().len(), 15);

        let filters = ctx.filters();
        let full = ctx.top_models(&filters).await.unwrap();
        assert_eq!(full.len(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn exports_current_page() {
        let ctx = memory_context();
        assert!(ctx.export_page_csv().unwrap().is_none());

        settle(ctx.initialize().await).await;
        let csv = ctx.export_page_csv().unwrap().unwrap();
        assert_eq!(csv.lines().count(), 51);
        assert!(csv.starts_with("\"VIN\",\"Make\""));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_restores_dataset_defaults() {
        let ctx = memory_context();
        settle(ctx.initialize().await).await;

        settle(ctx.update_filters(FilterPatch {
            makes: Some(BTreeSet::from(["TOYOTA".to_string()])),
            ..FilterPatch::default()
        }))
        .await;
        assert_eq!(ctx.snapshot().metrics.data.unwrap().total_vehicles, 30);

        settle(ctx.reset_filters()).await;
        let snap = ctx.snapshot();
        assert!(snap.filters.makes.is_empty());
        assert_eq!(snap.filters.years, YearRange::new(2022, 2023));
        assert_eq!(snap.metrics.data.unwrap().total_vehicles, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn replacing_filters_drops_unset_fields() {
        let ctx = memory_context();
        settle(ctx.initialize().await).await;

        settle(ctx.update_filters(FilterPatch {
            counties: Some(BTreeSet::from(["Pierce".to_string()])),
            ..FilterPatch::default()
        }))
        .await;
        ctx.set_page(2).await.unwrap();

        settle(ctx.replace_filters(FilterState {
            makes: BTreeSet::from(["TESLA".to_string()]),
            ..FilterState::with_years(YearRange::new(2023, 2023))
        }))
        .await;

        let snap = ctx.snapshot();
        assert!(snap.filters.counties.is_empty());
        assert_eq!(snap.page, 1);
        assert_eq!(snap.metrics.data.unwrap().total_vehicles, 60);
    }

    #[test]
    fn view_names_are_kebab_case() {
        assert_eq!(DashboardView::TopModels.to_string(), "top-models");
        assert_eq!(
            "filter-options".parse::<DashboardView>().unwrap(),
            DashboardView::FilterOptions
        );
        assert_eq!(DashboardView::iter().filter(|v| v.is_filtered()).count(), 8);
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let ctx = memory_context();
        let json = serde_json::to_value(ctx.snapshot()).unwrap();
        assert!(json.get("topModels").is_some());
        assert_eq!(json["metrics"]["isLoading"], false);
        assert!(json["metrics"]["data"].is_null());
    }
}
