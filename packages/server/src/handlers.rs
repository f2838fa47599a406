//! HTTP handler functions for the EV dashboard API.

use std::fmt::Display;
use std::sync::Arc;

use actix_web::http::header;
use actix_web::{HttpResponse, web};
use ev_dashboard::context::settle;
use ev_dashboard::{DashboardView, export};
use ev_dashboard_filter::{FilterPatch, FilterState};
use ev_dashboard_server_models::{
    ApiError, ApiHealth, ApiPageUpdate, ApiWaitParams, DashboardQueryParams,
};
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::AppState;

fn query_filters(state: &AppState, params: &DashboardQueryParams) -> FilterState {
    params.to_filter_state(state.dashboard.default_years())
}

fn respond<T: Serialize, E: Display>(
    what: &str,
    result: Result<Arc<T>, Arc<E>>,
) -> HttpResponse {
    match result {
        Ok(data) => HttpResponse::Ok().json(data.as_ref()),
        Err(e) => {
            log::error!("Failed to query {what}: {e}");
            HttpResponse::InternalServerError()
                .json(ApiError::new(format!("Failed to query {what}")))
        }
    }
}

fn csv_attachment(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", export::export_filename_today()),
        ))
        .body(body)
}

async fn snapshot_after(
    state: &AppState,
    wait: ApiWaitParams,
    handles: Vec<JoinHandle<()>>,
) -> HttpResponse {
    if wait.wait {
        settle(handles).await;
    }
    HttpResponse::Ok().json(state.dashboard.snapshot())
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/metrics`
pub async fn metrics(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond("metrics", state.dashboard.metrics(&filters).await)
}

/// `GET /api/counties`
pub async fn counties(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond(
        "county distribution",
        state.dashboard.county_distribution(&filters).await,
    )
}

/// `GET /api/makes`
pub async fn makes(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond(
        "make distribution",
        state.dashboard.make_distribution(&filters).await,
    )
}

/// `GET /api/yearly`
pub async fn yearly(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond(
        "yearly trends",
        state.dashboard.yearly_trends(&filters).await,
    )
}

/// `GET /api/range`
pub async fn range(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond(
        "range distribution",
        state.dashboard.range_distribution(&filters).await,
    )
}

/// `GET /api/cafv`
pub async fn cafv(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond(
        "CAFV eligibility",
        state.dashboard.cafv_eligibility(&filters).await,
    )
}

/// `GET /api/top-models`
pub async fn top_models(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond("top models", state.dashboard.top_models(&filters).await)
}

/// `GET /api/vehicles`
///
/// One table page, narrowed by the `search` parameter as well.
pub async fn vehicles(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    respond(
        "vehicles",
        state.dashboard.vehicles(&filters, params.page()).await,
    )
}

/// `GET /api/vehicles/export`
///
/// The same page as `/api/vehicles`, as a CSV download.
pub async fn export_vehicles(
    state: web::Data<AppState>,
    params: web::Query<DashboardQueryParams>,
) -> HttpResponse {
    let filters = query_filters(&state, &params);
    let page = match state.dashboard.vehicles(&filters, params.page()).await {
        Ok(page) => page,
        Err(e) => return respond::<(), _>("vehicles", Err(e)),
    };

    match export::vehicles_to_csv(&page.vehicles) {
        Ok(body) => csv_attachment(body),
        Err(e) => {
            log::error!("Failed to export vehicles: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to export vehicles"))
        }
    }
}

/// `GET /api/filter-options`
pub async fn filter_options(state: web::Data<AppState>) -> HttpResponse {
    respond("filter options", state.dashboard.filter_options().await)
}

/// `GET /api/dashboard`
///
/// Every view as currently held, with per-view loading and error state.
pub async fn dashboard(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.dashboard.snapshot())
}

/// `POST /api/dashboard/filters`
pub async fn update_filters(
    state: web::Data<AppState>,
    wait: web::Query<ApiWaitParams>,
    patch: web::Json<FilterPatch>,
) -> HttpResponse {
    let handles = state.dashboard.update_filters(patch.into_inner());
    snapshot_after(&state, *wait, handles).await
}

/// `PUT /api/dashboard/filters`
///
/// Replaces every filter; fields left out take their defaults.
pub async fn replace_filters(
    state: web::Data<AppState>,
    wait: web::Query<ApiWaitParams>,
    filters: web::Json<FilterState>,
) -> HttpResponse {
    let handles = state.dashboard.replace_filters(filters.into_inner());
    snapshot_after(&state, *wait, handles).await
}

/// `POST /api/dashboard/reset`
pub async fn reset_filters(
    state: web::Data<AppState>,
    wait: web::Query<ApiWaitParams>,
) -> HttpResponse {
    let handles = state.dashboard.reset_filters();
    snapshot_after(&state, *wait, handles).await
}

/// `POST /api/dashboard/page`
pub async fn set_page(
    state: web::Data<AppState>,
    wait: web::Query<ApiWaitParams>,
    body: web::Json<ApiPageUpdate>,
) -> HttpResponse {
    let handle = state.dashboard.set_page(body.page);
    snapshot_after(&state, *wait, vec![handle]).await
}

/// `POST /api/dashboard/views/{view}/revalidate`
///
/// Refetches one view, e.g. to retry it after a failure.
pub async fn revalidate_view(
    state: web::Data<AppState>,
    wait: web::Query<ApiWaitParams>,
    view: web::Path<String>,
) -> HttpResponse {
    let Ok(view) = view.parse::<DashboardView>() else {
        return HttpResponse::NotFound().json(ApiError::new(format!("Unknown view: {view}")));
    };
    let handle = state.dashboard.revalidate(view);
    snapshot_after(&state, *wait, vec![handle]).await
}

/// `GET /api/dashboard/export`
///
/// The table page the dashboard currently shows, as a CSV download.
pub async fn export_dashboard(state: web::Data<AppState>) -> HttpResponse {
    match state.dashboard.export_page_csv() {
        Ok(Some(body)) => csv_attachment(body),
        Ok(None) => HttpResponse::NotFound().json(ApiError::new("No table page loaded yet")),
        Err(e) => {
            log::error!("Failed to export dashboard page: {e}");
            HttpResponse::InternalServerError().json(ApiError::new("Failed to export vehicles"))
        }
    }
}
