#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Vehicle store query parameter and result types.
//!
//! A [`VehicleQuery`] describes the predicate pushed down to the store:
//! a conjunction of county, year, make, and EV-type constraints, plus an
//! optional OR'd text search. These types are independent of the filter
//! state the dashboard holds so the store contract can evolve on its own.

use ev_dashboard_vehicle_models::{EvClass, VehicleRecord};
use serde::{Deserialize, Serialize};
use strum_macros::AsRefStr;

/// A record column a query can ask the store to fill.
///
/// The string form is the column name in `electric_vehicles`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VehicleField {
    County,
    City,
    ModelYear,
    Make,
    Model,
    EvType,
    CafvEligibility,
    ElectricRange,
}

/// Predicate for retrieving vehicle records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleQuery {
    /// Counties to include (empty = all).
    pub counties: Vec<String>,
    /// Inclusive model-year bounds `(min, max)`.
    pub years: Option<(i32, i32)>,
    /// Makes to include (empty = all).
    pub makes: Vec<String>,
    /// EV type class to match by substring on the type label.
    pub ev_class: Option<EvClass>,
    /// Case-insensitive substring matched against VIN, make, model, or city.
    pub search: Option<String>,
    /// Columns the caller reads; empty means complete records. A store may
    /// fill more than asked for, and always fills `id`. Columns left out
    /// hold their defaults.
    pub fields: Vec<VehicleField>,
}

impl VehicleQuery {
    /// An unrestricted query.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Evaluates the predicate against a single record.
    ///
    /// This is the reference semantics every store implementation must
    /// reproduce.
    #[must_use]
    pub fn matches(&self, record: &VehicleRecord) -> bool {
        if !self.counties.is_empty() && !self.counties.iter().any(|c| *c == record.county) {
            return false;
        }

        if let Some((lo, hi)) = self.years {
            match record.model_year {
                Some(year) if year >= lo && year <= hi => {}
                _ => return false,
            }
        }

        if !self.makes.is_empty() && !self.makes.iter().any(|m| *m == record.make) {
            return false;
        }

        if let Some(class) = self.ev_class
            && !class.matches_label(record.ev_type.label())
        {
            return false;
        }

        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = [&record.vin, &record.make, &record.model, &record.city]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }
}

/// Offset/limit window for paged retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
}

impl PageWindow {
    /// Window for a 1-indexed `page` of `page_size` rows.
    ///
    /// Page 0 is treated as page 1.
    #[must_use]
    pub const fn for_page(page: u64, page_size: u64) -> Self {
        let page = if page == 0 { 1 } else { page };
        Self {
            offset: (page - 1).saturating_mul(page_size),
            limit: page_size,
        }
    }
}

/// One window of matching records plus the exact total match count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleSlice {
    /// Records inside the window.
    pub rows: Vec<VehicleRecord>,
    /// Total records matching the query, ignoring the window.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use ev_dashboard_vehicle_models::EvType;

    use super::*;

    fn record() -> VehicleRecord {
        VehicleRecord {
            vin: "5YJ3E1EA7K".to_string(),
            county: "King".to_string(),
            city: "Seattle".to_string(),
            model_year: Some(2020),
            make: "TESLA".to_string(),
            model: "MODEL 3".to_string(),
            ev_type: EvType::BatteryElectric,
            ..VehicleRecord::default()
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(VehicleQuery::all().matches(&record()));
    }

    #[test]
    fn constraints_are_conjunctive() {
        let query = VehicleQuery {
            counties: vec!["King".to_string()],
            years: Some((2020, 2020)),
            ev_class: Some(EvClass::Bev),
            ..VehicleQuery::default()
        };
        assert!(query.matches(&record()));

        let query = VehicleQuery {
            ev_class: Some(EvClass::Phev),
            ..query
        };
        assert!(!query.matches(&record()));
    }

    #[test]
    fn year_bound_excludes_records_without_year() {
        let query = VehicleQuery {
            years: Some((2000, 2030)),
            ..VehicleQuery::default()
        };
        let mut rec = record();
        rec.model_year = None;
        assert!(!query.matches(&rec));
    }

    #[test]
    fn search_matches_any_text_field() {
        for term in ["5yj3", "tesla", "model 3", "SEATTLE"] {
            let query = VehicleQuery {
                search: Some(term.to_string()),
                ..VehicleQuery::default()
            };
            assert!(query.matches(&record()), "{term} should match");
        }
        let query = VehicleQuery {
            search: Some("spokane".to_string()),
            ..VehicleQuery::default()
        };
        assert!(!query.matches(&record()));
    }

    #[test]
    fn page_window_is_one_indexed() {
        assert_eq!(PageWindow::for_page(1, 50), PageWindow { offset: 0, limit: 50 });
        assert_eq!(PageWindow::for_page(3, 50), PageWindow { offset: 100, limit: 50 });
        assert_eq!(PageWindow::for_page(0, 50), PageWindow { offset: 0, limit: 50 });
    }

    #[test]
    fn field_names_are_column_names() {
        assert_eq!(VehicleField::ModelYear.as_ref(), "model_year");
        assert_eq!(VehicleField::CafvEligibility.as_ref(), "cafv_eligibility");
        assert!(VehicleQuery::all().fields.is_empty());
    }
}
