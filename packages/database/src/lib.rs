#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Vehicle store connection, queries, and migrations for the EV dashboard.
//!
//! The [`VehicleStore`] trait is the read contract the query layer depends
//! on: predicate pushdown for the filter conjunction plus offset/limit
//! paging with an exact total. Two implementations ship here:
//!
//! * [`queries::PostgresVehicleStore`] runs raw SQL through
//!   `switchy_database` against the `electric_vehicles` table, whose schema
//!   is applied by the embedded `switchy_schema` migrations.
//! * [`memory::MemoryVehicleStore`] evaluates the same predicate over an
//!   in-memory record set, typically loaded from the dataset CSV via
//!   [`csv_source`].

pub mod csv_source;
pub mod db;
pub mod memory;
pub mod queries;

use async_trait::async_trait;
use ev_dashboard_database_models::{PageWindow, VehicleQuery, VehicleSlice};
use ev_dashboard_vehicle_models::VehicleRecord;
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during store operations.
///
/// An empty result is never an error; these all describe a failure to
/// reach or read the backing store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Read access to the vehicle records collection.
#[async_trait]
pub trait VehicleStore: Send + Sync {
    /// Returns every record matching `query`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be read. No matching rows
    /// yields `Ok` with an empty vector.
    async fn fetch(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, DbError>;

    /// Returns the records of `query` inside `window`, ordered by id, along
    /// with the exact number of matching records.
    ///
    /// A window past the last match yields an empty slice.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the store cannot be read.
    async fn fetch_page(
        &self,
        query: &VehicleQuery,
        window: PageWindow,
    ) -> Result<VehicleSlice, DbError>;
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`DbError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), DbError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}
