#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Electric vehicle registration record types.
//!
//! This crate defines the canonical [`VehicleRecord`] shape shared by the
//! store, the aggregation functions, and the API. Records are immutable once
//! loaded; nothing downstream mutates them.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Dataset label for battery electric vehicles.
pub const BEV_LABEL: &str = "Battery Electric Vehicle (BEV)";

/// Dataset label for plug-in hybrid electric vehicles.
pub const PHEV_LABEL: &str = "Plug-in Hybrid Electric Vehicle (PHEV)";

/// Placeholder shown for a missing eligibility status or key.
pub const UNKNOWN: &str = "Unknown";

/// Short classification code used by filters (`BEV` / `PHEV`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum EvClass {
    /// Battery electric.
    Bev,
    /// Plug-in hybrid.
    Phev,
}

impl EvClass {
    /// Returns `true` if `label` contains this class code, ignoring case.
    ///
    /// Mirrors an `ILIKE '%BEV%'` predicate against the stored label.
    #[must_use]
    pub fn matches_label(self, label: &str) -> bool {
        label
            .to_ascii_uppercase()
            .contains(self.as_ref())
    }
}

/// Electric vehicle type as recorded in the dataset.
///
/// Known labels map onto dedicated variants; anything else is kept verbatim
/// in [`EvType::Other`] so no information is lost.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EvType {
    /// Battery Electric Vehicle (BEV).
    BatteryElectric,
    /// Plug-in Hybrid Electric Vehicle (PHEV).
    PlugInHybrid,
    /// Any other label.
    Other(String),
}

impl EvType {
    /// Parses a dataset label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let trimmed = label.trim();
        if trimmed == BEV_LABEL {
            Self::BatteryElectric
        } else if trimmed == PHEV_LABEL {
            Self::PlugInHybrid
        } else {
            Self::Other(trimmed.to_string())
        }
    }

    /// Returns the label as it appears in the dataset.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::BatteryElectric => BEV_LABEL,
            Self::PlugInHybrid => PHEV_LABEL,
            Self::Other(label) => label,
        }
    }

    /// Returns `true` when the label contains `BEV` (case-sensitive).
    ///
    /// Aggregations classify everything else as PHEV, including labels
    /// that match neither code.
    #[must_use]
    pub fn is_bev(&self) -> bool {
        self.label().contains("BEV")
    }
}

impl Default for EvType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for EvType {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<EvType> for String {
    fn from(value: EvType) -> Self {
        match value {
            EvType::Other(label) => label,
            known => known.label().to_string(),
        }
    }
}

impl std::fmt::Display for EvType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Longitude.
    pub longitude: f64,
    /// Latitude.
    pub latitude: f64,
}

impl GeoPoint {
    /// Creates a new point.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
        }
    }

    /// Parses WKT text of the form `POINT (-122.30839 47.610365)`.
    ///
    /// Returns `None` for anything that is not a two-coordinate point.
    #[must_use]
    pub fn parse_wkt(s: &str) -> Option<Self> {
        let rest = s.trim().strip_prefix("POINT")?;
        let inner = rest.trim_start().strip_prefix('(')?;
        let inner = &inner[..inner.find(')')?];

        let mut parts = inner.split_whitespace();
        let longitude = parts.next()?.parse().ok()?;
        let latitude = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }

        Some(Self::new(longitude, latitude))
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "POINT ({} {})", self.longitude, self.latitude)
    }
}

/// One registered electric vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRecord {
    /// Primary key.
    pub id: i64,
    /// First ten characters of the VIN.
    pub vin: String,
    /// County of registration.
    pub county: String,
    /// City of registration.
    pub city: String,
    /// Two-letter state abbreviation.
    pub state: String,
    /// Postal code.
    pub postal_code: String,
    /// Model year, if known.
    pub model_year: Option<i32>,
    /// Manufacturer.
    pub make: String,
    /// Model name.
    pub model: String,
    /// Electric vehicle type.
    pub ev_type: EvType,
    /// Clean Alternative Fuel Vehicle eligibility status.
    pub cafv_eligibility: String,
    /// All-electric range in miles (0 = unknown or not researched).
    pub electric_range: u32,
    /// Base MSRP in dollars (0 = unknown).
    pub base_msrp: u32,
    /// Legislative district.
    pub legislative_district: Option<i32>,
    /// Department of Licensing vehicle id.
    pub dol_vehicle_id: Option<i64>,
    /// Registration location.
    pub vehicle_location: Option<GeoPoint>,
    /// Electric utility serving the location.
    pub electric_utility: String,
    /// 2020 census tract.
    pub census_tract: String,
}

impl VehicleRecord {
    /// Eligibility status for display: `"Unknown"` when missing.
    #[must_use]
    pub fn display_cafv(&self) -> &str {
        if self.cafv_eligibility.trim().is_empty() {
            UNKNOWN
        } else {
            &self.cafv_eligibility
        }
    }

    /// `"make model"` composite key, or `None` if either part is missing.
    #[must_use]
    pub fn make_model(&self) -> Option<String> {
        if self.make.is_empty() || self.model.is_empty() {
            None
        } else {
            Some(format!("{} {}", self.make, self.model))
        }
    }
}
