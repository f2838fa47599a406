#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! EV dashboard context.
//!
//! [`context::DashboardContext`] owns the filter state and one cached query
//! slot per dashboard view. Changing the filters fans out a revalidation to
//! every slot; each slot keeps showing its previous data until the new
//! result arrives, and each fails independently. [`export`] renders the
//! visible table page as CSV, and [`config`] holds the tunable timings and
//! limits.

pub mod config;
pub mod context;
pub mod export;

pub use config::DashboardConfig;
pub use context::{DashboardContext, DashboardSnapshot, DashboardView, ViewState};

use thiserror::Error;

/// Errors that can occur outside the per-view query slots.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// The configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        /// Path that was read.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`DashboardConfig`].
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// CSV output failed.
    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// The CSV writer could not be flushed into its buffer.
    #[error("CSV export error: {0}")]
    CsvBuffer(String),
}
