#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregated view types for the EV dashboard.
//!
//! Every type here is derived from a filtered record set and never
//! persisted. Field names serialize in `camelCase` for chart consumers.

use ev_dashboard_vehicle_models::VehicleRecord;
use serde::{Deserialize, Serialize};

/// Label of the synthetic remainder row in the make distribution.
pub const OTHERS_LABEL: &str = "Others";

/// Headline numbers for the metric cards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    /// Records matching the filters.
    pub total_vehicles: u64,
    /// Records whose type label contains `BEV`.
    pub bev_count: u64,
    /// `total_vehicles - bev_count`.
    pub phev_count: u64,
    /// Mean electric range over records with a known range, rounded.
    pub avg_electric_range: u32,
    /// County with the most records.
    pub top_county: String,
    /// Make with the most records.
    pub top_make: String,
    /// Growth of the latest model year over the one before, in percent,
    /// rounded to one decimal.
    pub year_over_year_growth: f64,
}

/// Records per county.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountyCount {
    /// County name.
    pub county: String,
    /// Number of records.
    pub count: u64,
}

/// Records per make with their share of the total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeShare {
    /// Make, or [`OTHERS_LABEL`] for the remainder row.
    pub make: String,
    /// Number of records.
    pub count: u64,
    /// `count / total * 100`.
    pub percentage: f64,
}

/// BEV/PHEV split for one model year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyCount {
    /// Model year.
    pub year: i32,
    /// `bev_count + phev_count`.
    pub total: u64,
    /// Battery electric records.
    pub bev_count: u64,
    /// Everything else.
    pub phev_count: u64,
}

/// Records whose electric range falls within one band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeBucket {
    /// Band label, e.g. `"51-100"`.
    pub label: String,
    /// Number of records.
    pub count: u64,
}

/// Records per CAFV eligibility status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CafvBucket {
    /// Eligibility status, `"Unknown"` when missing.
    pub status: String,
    /// Number of records.
    pub count: u64,
}

/// Records per `"make model"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCount {
    /// Make and model joined by a space.
    pub model: String,
    /// Number of records.
    pub count: u64,
}

/// One page of the vehicle table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePage {
    /// Records on this page.
    pub vehicles: Vec<VehicleRecord>,
    /// Records matching the filters and search.
    pub total: u64,
    /// 1-indexed page number.
    pub page: u64,
    /// Rows per page.
    pub page_size: u64,
    /// `ceil(total / page_size)`.
    pub total_pages: u64,
}

/// Model-year span of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearBounds {
    /// Earliest model year.
    pub min: i32,
    /// Latest model year.
    pub max: i32,
}

/// Choices available to the filter panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    /// Distinct counties, sorted.
    pub counties: Vec<String>,
    /// Distinct makes, sorted.
    pub makes: Vec<String>,
    /// Model-year span.
    pub years: YearBounds,
}
