#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dashboard filter state.
//!
//! A [`FilterState`] is always complete and valid: the year range is kept
//! ordered on construction and deserialization, and empty selections mean
//! "no restriction" rather than "match nothing". The [`manager`] module
//! holds the single current state and swaps it atomically.

pub mod manager;

use std::collections::BTreeSet;

use ev_dashboard_vehicle_models::EvClass;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Earliest model year assumed before the dataset's range is known.
pub const DEFAULT_MIN_YEAR: i32 = 2012;

/// Latest model year assumed before the dataset's range is known.
pub const DEFAULT_MAX_YEAR: i32 = 2024;

/// Inclusive model-year range. `min <= max` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct YearRange {
    min: i32,
    max: i32,
}

impl YearRange {
    /// Creates a range, swapping the bounds if they are reversed.
    #[must_use]
    pub const fn new(a: i32, b: i32) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub const fn min(self) -> i32 {
        self.min
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub const fn max(self) -> i32 {
        self.max
    }

    /// Returns `true` if `year` lies within the range.
    #[must_use]
    pub const fn contains(self, year: i32) -> bool {
        year >= self.min && year <= self.max
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_YEAR, DEFAULT_MAX_YEAR)
    }
}

impl From<[i32; 2]> for YearRange {
    fn from([a, b]: [i32; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<YearRange> for [i32; 2] {
    fn from(range: YearRange) -> Self {
        [range.min, range.max]
    }
}

/// EV-type selection.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum EvTypeFilter {
    /// No restriction.
    #[default]
    #[serde(rename = "all")]
    #[strum(serialize = "all")]
    All,
    /// Battery electric only.
    #[serde(rename = "BEV")]
    #[strum(serialize = "BEV")]
    Bev,
    /// Plug-in hybrid only.
    #[serde(rename = "PHEV")]
    #[strum(serialize = "PHEV")]
    Phev,
}

impl EvTypeFilter {
    /// The class code to match, or `None` for [`EvTypeFilter::All`].
    #[must_use]
    pub const fn class(self) -> Option<EvClass> {
        match self {
            Self::All => None,
            Self::Bev => Some(EvClass::Bev),
            Self::Phev => Some(EvClass::Phev),
        }
    }
}

/// The complete current filter selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterState {
    /// Counties to include (empty = all).
    pub counties: BTreeSet<String>,
    /// Model years to include.
    pub years: YearRange,
    /// Makes to include (empty = all).
    pub makes: BTreeSet<String>,
    /// EV-type selection.
    pub ev_type: EvTypeFilter,
    /// Free-text search over VIN, make, model, and city.
    pub search_query: String,
}

impl FilterState {
    /// Default state spanning `years`.
    #[must_use]
    pub fn with_years(years: YearRange) -> Self {
        Self {
            years,
            ..Self::default()
        }
    }

    /// Returns a new state with `patch` merged over `self`.
    #[must_use]
    pub fn merged(&self, patch: FilterPatch) -> Self {
        let FilterPatch {
            counties,
            years,
            makes,
            ev_type,
            search_query,
        } = patch;

        Self {
            counties: counties.unwrap_or_else(|| self.counties.clone()),
            years: years.unwrap_or(self.years),
            makes: makes.unwrap_or_else(|| self.makes.clone()),
            ev_type: ev_type.unwrap_or(self.ev_type),
            search_query: search_query.unwrap_or_else(|| self.search_query.clone()),
        }
    }

    /// Trimmed search text, or `None` when there is nothing to search for.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        let term = self.search_query.trim();
        if term.is_empty() { None } else { Some(term) }
    }

    /// Deterministic serialization used to key cached query results.
    ///
    /// Sets are ordered, so equal states always produce equal keys.
    #[must_use]
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            log::warn!("Failed to serialize filter state for cache key: {e}");
            format!("{self:?}")
        })
    }
}

/// Partial update to a [`FilterState`]. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterPatch {
    /// Replacement county set.
    pub counties: Option<BTreeSet<String>>,
    /// Replacement year range.
    pub years: Option<YearRange>,
    /// Replacement make set.
    pub makes: Option<BTreeSet<String>>,
    /// Replacement EV-type selection.
    pub ev_type: Option<EvTypeFilter>,
    /// Replacement search text.
    pub search_query: Option<String>,
}
