//! Loads vehicle records from the published registration CSV.
//!
//! Column names follow the Washington State DOL export. Unparsable numbers
//! fall back to `0` (range, MSRP) or `None` (year, district, DOL id), and a
//! row that cannot be decoded at all is logged and skipped so one bad line
//! does not abort the load.

use std::io::Read;
use std::path::{Path, PathBuf};

use ev_dashboard_vehicle_models::{EvType, GeoPoint, VehicleRecord};
use serde::Deserialize;

use crate::DbError;

/// Rows between progress log lines.
const PROGRESS_INTERVAL: u64 = 5000;

/// One raw CSV row, keyed by the export's column headers.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SourceRow {
    #[serde(rename = "VIN (1-10)")]
    vin: String,
    #[serde(rename = "County")]
    county: String,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "State")]
    state: String,
    #[serde(rename = "Postal Code")]
    postal_code: String,
    #[serde(rename = "Model Year")]
    model_year: String,
    #[serde(rename = "Make")]
    make: String,
    #[serde(rename = "Model")]
    model: String,
    #[serde(rename = "Electric Vehicle Type")]
    ev_type: String,
    #[serde(rename = "Clean Alternative Fuel Vehicle (CAFV) Eligibility")]
    cafv_eligibility: String,
    #[serde(rename = "Electric Range")]
    electric_range: String,
    #[serde(rename = "Base MSRP")]
    base_msrp: String,
    #[serde(rename = "Legislative District")]
    legislative_district: String,
    #[serde(rename = "DOL Vehicle ID")]
    dol_vehicle_id: String,
    #[serde(rename = "Vehicle Location")]
    vehicle_location: String,
    #[serde(rename = "Electric Utility")]
    electric_utility: String,
    #[serde(rename = "2020 Census Tract")]
    census_tract: String,
}

fn parse_num<T: std::str::FromStr>(s: &str) -> Option<T> {
    s.trim().parse().ok()
}

impl SourceRow {
    fn into_record(self, id: i64) -> VehicleRecord {
        VehicleRecord {
            id,
            model_year: parse_num(&self.model_year),
            ev_type: EvType::from_label(&self.ev_type),
            electric_range: parse_num(&self.electric_range).unwrap_or(0),
            base_msrp: parse_num(&self.base_msrp).unwrap_or(0),
            legislative_district: parse_num(&self.legislative_district),
            dol_vehicle_id: parse_num(&self.dol_vehicle_id),
            vehicle_location: GeoPoint::parse_wkt(&self.vehicle_location),
            vin: self.vin,
            county: self.county,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            make: self.make,
            model: self.model,
            cafv_eligibility: self.cafv_eligibility,
            electric_utility: self.electric_utility,
            census_tract: self.census_tract,
        }
    }
}

/// Outcome of a CSV load.
#[derive(Debug, Default)]
pub struct CsvLoad {
    /// Records decoded, with ids assigned from 1 in file order.
    pub records: Vec<VehicleRecord>,
    /// Rows that could not be decoded.
    pub skipped: u64,
}

/// Decodes vehicle records from CSV text with a header row.
///
/// # Errors
///
/// Returns [`DbError::Csv`] if the header row itself cannot be read.
pub fn read_vehicles<R: Read>(reader: R) -> Result<CsvLoad, DbError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    rdr.headers()?;

    let mut load = CsvLoad::default();
    let mut row_count = 0u64;

    for result in rdr.deserialize::<SourceRow>() {
        row_count += 1;
        match result {
            Ok(row) => {
                let id = i64::try_from(load.records.len() + 1).unwrap_or(i64::MAX);
                load.records.push(row.into_record(id));
            }
            Err(e) => {
                log::warn!("Skipping CSV row {row_count}: {e}");
                load.skipped += 1;
            }
        }

        if row_count % PROGRESS_INTERVAL == 0 {
            log::info!("Processed {row_count} rows...");
        }
    }

    log::info!(
        "Finished reading CSV: {} records, {} skipped",
        load.records.len(),
        load.skipped
    );

    Ok(load)
}

/// Reads and decodes the CSV file at `path` on a blocking thread.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be opened or its header is
/// unreadable.
pub async fn load_vehicles_csv(path: &Path) -> Result<CsvLoad, DbError> {
    let path: PathBuf = path.to_path_buf();
    log::info!("Reading vehicles from {}", path.display());

    tokio::task::spawn_blocking(move || {
        let file = std::fs::File::open(&path)?;
        read_vehicles(std::io::BufReader::new(file))
    })
    .await
    .map_err(|e| DbError::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "VIN (1-10),County,City,State,Postal Code,Model Year,Make,Model,\
        Electric Vehicle Type,Clean Alternative Fuel Vehicle (CAFV) Eligibility,\
        Electric Range,Base MSRP,Legislative District,DOL Vehicle ID,Vehicle Location,\
        Electric Utility,2020 Census Tract";

    #[test]
    fn maps_source_columns() {
        let csv = format!(
            "{HEADER}\n\
             5YJ3E1EA7K,King,Seattle,WA,98122,2019,TESLA,MODEL 3,\
             Battery Electric Vehicle (BEV),Clean Alternative Fuel Vehicle Eligible,\
             220,0,37,477309682,POINT (-122.30839 47.610365),CITY OF SEATTLE - (WA),53033007800\n"
        );
        let load = read_vehicles(csv.as_bytes()).unwrap();
        assert_eq!(load.skipped, 0);
        let record = &load.records[0];
        assert_eq!(record.id, 1);
        assert_eq!(record.vin, "5YJ3E1EA7K");
        assert_eq!(record.county, "King");
        assert_eq!(record.model_year, Some(2019));
        assert_eq!(record.ev_type, EvType::BatteryElectric);
        assert_eq!(record.electric_range, 220);
        assert_eq!(record.legislative_district, Some(37));
        assert_eq!(record.dol_vehicle_id, Some(477_309_682));
        assert!(record.vehicle_location.is_some());
        assert_eq!(record.census_tract, "53033007800");
    }

    #[test]
    fn defaults_unparsable_numbers() {
        let csv = format!(
            "{HEADER}\n\
             1N4AZ0CP5D,Yakima,Yakima,WA,98908,,NISSAN,LEAF,\
             Battery Electric Vehicle (BEV),,abc,,,,,PACIFICORP,\n"
        );
        let load = read_vehicles(csv.as_bytes()).unwrap();
        let record = &load.records[0];
        assert_eq!(record.model_year, None);
        assert_eq!(record.electric_range, 0);
        assert_eq!(record.base_msrp, 0);
        assert_eq!(record.legislative_district, None);
        assert_eq!(record.vehicle_location, None);
        assert_eq!(record.display_cafv(), "Unknown");
    }

    #[test]
    fn missing_columns_fall_back_to_defaults() {
        let csv = "VIN (1-10),Make\nABC,KIA\n";
        let load = read_vehicles(csv.as_bytes()).unwrap();
        assert_eq!(load.records.len(), 1);
        assert_eq!(load.records[0].make, "KIA");
        assert_eq!(load.records[0].county, "");
    }
}
