//! CSV export of the vehicle table.

use chrono::NaiveDate;
use csv::{QuoteStyle, WriterBuilder};
use ev_dashboard_vehicle_models::VehicleRecord;

use crate::DashboardError;

/// Column headers, in table order.
pub const EXPORT_HEADERS: [&str; 9] = [
    "VIN",
    "Make",
    "Model",
    "Year",
    "Type",
    "Range (mi)",
    "County",
    "City",
    "CAFV",
];

fn export_row(v: &VehicleRecord) -> [String; 9] {
    [
        v.vin.clone(),
        v.make.clone(),
        v.model.clone(),
        v.model_year.map(|y| y.to_string()).unwrap_or_default(),
        v.ev_type.label().to_string(),
        v.electric_range.to_string(),
        v.county.clone(),
        v.city.clone(),
        v.cafv_eligibility.clone(),
    ]
}

/// Renders `vehicles` as CSV with every field double-quoted.
///
/// # Errors
///
/// Returns [`DashboardError`] if a row cannot be written.
pub fn vehicles_to_csv(vehicles: &[VehicleRecord]) -> Result<String, DashboardError> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(EXPORT_HEADERS)?;
    for vehicle in vehicles {
        wtr.write_record(export_row(vehicle))?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| DashboardError::CsvBuffer(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| DashboardError::CsvBuffer(e.to_string()))
}

/// Download filename for an export made on `date`.
#[must_use]
pub fn export_filename(date: NaiveDate) -> String {
    format!("ev-data-{}.csv", date.format("%Y-%m-%d"))
}

/// Download filename for an export made today (UTC).
#[must_use]
pub fn export_filename_today() -> String {
    export_filename(chrono::Utc::now().date_naive())
}
