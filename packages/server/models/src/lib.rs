#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the EV dashboard server.
//!
//! Query parameters arrive as flat strings (comma-separated lists, separate
//! year bounds) and are converted into a complete [`FilterState`] here, so
//! handlers never see a partially valid filter.

use std::collections::BTreeSet;

use ev_dashboard_filter::{EvTypeFilter, FilterState, YearRange};
use serde::{Deserialize, Serialize};

/// Filter and paging parameters accepted by every data endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQueryParams {
    /// Comma-separated county names.
    pub counties: Option<String>,
    /// Comma-separated makes.
    pub makes: Option<String>,
    /// Earliest model year (inclusive).
    pub year_min: Option<i32>,
    /// Latest model year (inclusive).
    pub year_max: Option<i32>,
    /// `all`, `BEV`, or `PHEV`.
    pub ev_type: Option<String>,
    /// Free-text search over VIN, make, model, and city.
    pub search: Option<String>,
    /// 1-indexed table page.
    pub page: Option<u64>,
}

fn split_list(s: Option<&str>) -> BTreeSet<String> {
    s.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl DashboardQueryParams {
    /// Builds the filter state these parameters describe.
    ///
    /// Missing year bounds come from `default_years`. An unrecognized EV
    /// type is logged and treated as `all`.
    #[must_use]
    pub fn to_filter_state(&self, default_years: YearRange) -> FilterState {
        let ev_type = self
            .ev_type
            .as_deref()
            .map_or(EvTypeFilter::All, |s| {
                s.trim().parse().unwrap_or_else(|_| {
                    log::warn!("Ignoring unknown EV type filter {s:?}");
                    EvTypeFilter::All
                })
            });

        FilterState {
            counties: split_list(self.counties.as_deref()),
            years: YearRange::new(
                self.year_min.unwrap_or_else(|| default_years.min()),
                self.year_max.unwrap_or_else(|| default_years.max()),
            ),
            makes: split_list(self.makes.as_deref()),
            ev_type,
            search_query: self.search.clone().unwrap_or_default(),
        }
    }

    /// Requested page, defaulting to 1.
    #[must_use]
    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Body of the table page change request.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ApiPageUpdate {
    /// 1-indexed page.
    pub page: u64,
}

/// Whether a state-changing request should wait for the views to settle
/// before responding.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ApiWaitParams {
    /// Wait for every revalidation to finish.
    pub wait: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// What went wrong.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
