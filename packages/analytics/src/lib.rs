#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter-driven aggregation queries for the EV dashboard.
//!
//! [`queries`] turns the current filter state into a store predicate,
//! retrieves the matching records, and hands them to the pure reductions in
//! [`aggregate`]. Each query produces one chart-ready view.

pub mod aggregate;
pub mod queries;

use ev_dashboard_database::DbError;
use thiserror::Error;

/// Errors that can occur during analytics operations.
///
/// Only store failures surface here; an empty record set aggregates to an
/// empty (or zeroed) view.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The backing store could not be read.
    #[error("Store error: {0}")]
    Store(#[from] DbError),
}
