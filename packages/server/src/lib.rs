#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the EV dashboard.
//!
//! Serves each dashboard view as its own JSON endpoint, filtered by query
//! parameters, plus a stateful `/api/dashboard` surface backed by a single
//! [`DashboardContext`]. Records come from `PostgreSQL` by default, or from
//! the dataset CSV when `EV_DASHBOARD_CSV` is set.

mod handlers;

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use ev_dashboard::context::settle;
use ev_dashboard::{DashboardConfig, DashboardContext};
use ev_dashboard_database::memory::MemoryVehicleStore;
use ev_dashboard_database::queries::PostgresVehicleStore;
use ev_dashboard_database::{VehicleStore, db, run_migrations};

/// Environment variable naming a dataset CSV to serve from memory.
pub const CSV_ENV: &str = "EV_DASHBOARD_CSV";

/// Shared application state.
pub struct AppState {
    /// The dashboard every handler reads from.
    pub dashboard: Arc<DashboardContext>,
}

fn startup_error(step: &str, e: impl Display) -> std::io::Error {
    log::error!("Failed to {step}: {e}");
    std::io::Error::other(format!("Failed to {step}: {e}"))
}

/// Opens the vehicle store selected by the environment.
///
/// # Errors
///
/// Returns an error if the CSV cannot be loaded, or the database cannot be
/// reached or migrated.
#[allow(clippy::future_not_send)]
pub async fn open_store() -> std::io::Result<Arc<dyn VehicleStore>> {
    if let Ok(path) = std::env::var(CSV_ENV)
        && !path.trim().is_empty()
    {
        let store = MemoryVehicleStore::from_csv(Path::new(path.trim()))
            .await
            .map_err(|e| startup_error("load vehicle CSV", e))?;
        log::info!("Serving {} vehicles from {}", store.len(), path.trim());
        return Ok(Arc::new(store));
    }

    log::info!("Connecting to database...");
    let db_conn = db::connect_from_env()
        .await
        .map_err(|e| startup_error("connect to database", e))?;

    log::info!("Running migrations...");
    run_migrations(db_conn.as_ref())
        .await
        .map_err(|e| startup_error("run migrations", e))?;

    Ok(Arc::new(PostgresVehicleStore::new(Arc::from(db_conn))))
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/metrics", web::get().to(handlers::metrics))
            .route("/counties", web::get().to(handlers::counties))
            .route("/makes", web::get().to(handlers::makes))
            .route("/yearly", web::get().to(handlers::yearly))
            .route("/range", web::get().to(handlers::range))
            .route("/cafv", web::get().to(handlers::cafv))
            .route("/top-models", web::get().to(handlers::top_models))
            .route("/vehicles", web::get().to(handlers::vehicles))
            .route("/vehicles/export", web::get().to(handlers::export_vehicles))
            .route("/filter-options", web::get().to(handlers::filter_options))
            .route("/dashboard", web::get().to(handlers::dashboard))
            .route("/dashboard/filters", web::post().to(handlers::update_filters))
            .route("/dashboard/filters", web::put().to(handlers::replace_filters))
            .route("/dashboard/reset", web::post().to(handlers::reset_filters))
            .route("/dashboard/page", web::post().to(handlers::set_page))
            .route(
                "/dashboard/views/{view}/revalidate",
                web::post().to(handlers::revalidate_view),
            )
            .route("/dashboard/export", web::get().to(handlers::export_dashboard)),
    );
}

/// Starts the EV dashboard API server.
///
/// Loads the dashboard config, opens the vehicle store, loads every view
/// once, and then serves the API. The caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an error if startup fails or the HTTP server cannot bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let config = DashboardConfig::from_env().map_err(|e| startup_error("load config", e))?;
    let store = open_store().await?;

    let dashboard = Arc::new(DashboardContext::new(store, config));
    log::info!("Loading dashboard views...");
    settle(dashboard.initialize().await).await;

    let state = web::Data::new(AppState { dashboard });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
