//! `PostgreSQL` implementation of [`VehicleStore`].
//!
//! Queries are raw SQL through `query_raw_params()`. Every filter is pushed
//! down as a positional parameter; set membership expands to an `IN` list
//! with one parameter per element.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use ev_dashboard_database_models::{PageWindow, VehicleField, VehicleQuery, VehicleSlice};
use ev_dashboard_vehicle_models::{EvType, GeoPoint, VehicleRecord};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue, Row};

use crate::{DbError, VehicleStore};

const VEHICLE_COLUMNS: &str = "id, vin, county, city, state, postal_code, model_year, make, model,
     ev_type, cafv_eligibility, electric_range, base_msrp, legislative_district,
     dol_vehicle_id, longitude, latitude, electric_utility, census_tract";

/// Vehicle store backed by the `electric_vehicles` table.
pub struct PostgresVehicleStore {
    db: Arc<dyn Database>,
}

impl PostgresVehicleStore {
    /// Wraps an open database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

/// Escapes `LIKE` wildcards so user text is matched literally.
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Appends `column IN ($n, $n+1, ...)` for `values`.
fn push_in_list(
    frags: &mut Vec<String>,
    params: &mut Vec<DatabaseValue>,
    idx: &mut u32,
    column: &str,
    values: &[String],
) {
    if values.is_empty() {
        return;
    }

    let mut placeholders = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            placeholders.push_str(", ");
        }
        let _ = write!(placeholders, "${idx}");
        params.push(DatabaseValue::String(value.clone()));
        *idx += 1;
    }
    frags.push(format!("{column} IN ({placeholders})"));
}

/// Builds the WHERE clause and parameter list for `query`.
///
/// Returns `(where_clause, params, next_param_index)`. The clause is empty
/// when the query is unrestricted.
fn build_filters(query: &VehicleQuery) -> (String, Vec<DatabaseValue>, u32) {
    let mut frags = Vec::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = 1u32;

    push_in_list(&mut frags, &mut params, &mut idx, "county", &query.counties);

    if let Some((lo, hi)) = query.years {
        frags.push(format!("model_year >= ${idx} AND model_year <= ${}", idx + 1));
        params.push(DatabaseValue::Int32(lo));
        params.push(DatabaseValue::Int32(hi));
        idx += 2;
    }

    push_in_list(&mut frags, &mut params, &mut idx, "make", &query.makes);

    if let Some(class) = query.ev_class {
        frags.push(format!("ev_type ILIKE ${idx}"));
        params.push(DatabaseValue::String(format!("%{}%", class.as_ref())));
        idx += 1;
    }

    if let Some(search) = &query.search {
        frags.push(format!(
            "(vin ILIKE ${idx} OR make ILIKE ${idx} OR model ILIKE ${idx} OR city ILIKE ${idx})"
        ));
        params.push(DatabaseValue::String(format!("%{}%", escape_like(search))));
        idx += 1;
    }

    let clause = if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    };

    (clause, params, idx)
}

/// Column list for the requested fields; every column when none are named.
fn select_list(fields: &[VehicleField]) -> String {
    if fields.is_empty() {
        return VEHICLE_COLUMNS.to_string();
    }

    let mut columns = vec!["id"];
    for field in fields {
        let column = field.as_ref();
        if !columns.contains(&column) {
            columns.push(column);
        }
    }
    columns.join(", ")
}

/// Missing columns (outside the projection) take their defaults.
fn row_to_vehicle(row: &Row) -> VehicleRecord {
    let ev_type: String = row.to_value("ev_type").unwrap_or_default();
    let electric_range: i32 = row.to_value("electric_range").unwrap_or(0);
    let base_msrp: i32 = row.to_value("base_msrp").unwrap_or(0);
    let longitude: Option<f64> = row.to_value("longitude").unwrap_or(None);
    let latitude: Option<f64> = row.to_value("latitude").unwrap_or(None);

    VehicleRecord {
        id: row.to_value("id").unwrap_or(0),
        vin: row.to_value("vin").unwrap_or_default(),
        county: row.to_value("county").unwrap_or_default(),
        city: row.to_value("city").unwrap_or_default(),
        state: row.to_value("state").unwrap_or_default(),
        postal_code: row.to_value("postal_code").unwrap_or_default(),
        model_year: row.to_value("model_year").unwrap_or(None),
        make: row.to_value("make").unwrap_or_default(),
        model: row.to_value("model").unwrap_or_default(),
        ev_type: EvType::from_label(&ev_type),
        cafv_eligibility: row.to_value("cafv_eligibility").unwrap_or_default(),
        electric_range: u32::try_from(electric_range).unwrap_or(0),
        base_msrp: u32::try_from(base_msrp).unwrap_or(0),
        legislative_district: row.to_value("legislative_district").unwrap_or(None),
        dol_vehicle_id: row.to_value("dol_vehicle_id").unwrap_or(None),
        vehicle_location: longitude
            .zip(latitude)
            .map(|(lng, lat)| GeoPoint::new(lng, lat)),
        electric_utility: row.to_value("electric_utility").unwrap_or_default(),
        census_tract: row.to_value("census_tract").unwrap_or_default(),
    }
}

#[async_trait]
impl VehicleStore for PostgresVehicleStore {
    async fn fetch(&self, query: &VehicleQuery) -> Result<Vec<VehicleRecord>, DbError> {
        let (wc, params, _) = build_filters(query);
        let columns = select_list(&query.fields);
        let sql = format!("SELECT {columns} FROM electric_vehicles{wc} ORDER BY id");

        let rows = self.db.query_raw_params(&sql, &params).await?;
        log::debug!("Fetched {} vehicle rows", rows.len());

        Ok(rows.iter().map(row_to_vehicle).collect())
    }

    async fn fetch_page(
        &self,
        query: &VehicleQuery,
        window: PageWindow,
    ) -> Result<VehicleSlice, DbError> {
        let (wc, mut params, idx) = build_filters(query);

        let count_sql = format!("SELECT COUNT(*) as total FROM electric_vehicles{wc}");
        let count_rows = self.db.query_raw_params(&count_sql, &params).await?;
        let row = count_rows.first().ok_or_else(|| DbError::Conversion {
            message: "COUNT(*) returned no rows".to_string(),
        })?;
        let total: i64 = row.to_value("total").map_err(|e| DbError::Conversion {
            message: format!("Failed to parse vehicle count: {e}"),
        })?;

        let columns = select_list(&query.fields);
        let page_sql = format!(
            "SELECT {columns} FROM electric_vehicles{wc} ORDER BY id LIMIT ${idx} OFFSET ${}",
            idx + 1
        );
        params.push(DatabaseValue::Int64(i64::try_from(window.limit).unwrap_or(i64::MAX)));
        params.push(DatabaseValue::Int64(i64::try_from(window.offset).unwrap_or(i64::MAX)));

        let rows = self.db.query_raw_params(&page_sql, &params).await?;

        Ok(VehicleSlice {
            rows: rows.iter().map(row_to_vehicle).collect(),
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use ev_dashboard_vehicle_models::EvClass;

    use super::*;

    #[test]
    fn unrestricted_query_has_no_where_clause() {
        let (wc, params, idx) = build_filters(&VehicleQuery::all());
        assert!(wc.is_empty());
        assert!(params.is_empty());
        assert_eq!(idx, 1);
    }

    #[test]
    fn builds_conjunction_with_positional_params() {
        let query = VehicleQuery {
            counties: vec!["King".to_string(), "Pierce".to_string()],
            years: Some((2018, 2023)),
            makes: vec!["TESLA".to_string()],
            ev_class: Some(EvClass::Bev),
            ..VehicleQuery::default()
        };
        let (wc, params, idx) = build_filters(&query);
        assert_eq!(
            wc,
            " WHERE county IN ($1, $2) AND model_year >= $3 AND model_year <= $4 \
             AND make IN ($5) AND ev_type ILIKE $6"
        );
        assert_eq!(params.len(), 6);
        assert_eq!(idx, 7);
    }

    #[test]
    fn search_reuses_one_param_across_text_columns() {
        let query = VehicleQuery {
            search: Some("model".to_string()),
            ..VehicleQuery::default()
        };
        let (wc, params, _) = build_filters(&query);
        assert_eq!(
            wc,
            " WHERE (vin ILIKE $1 OR make ILIKE $1 OR model ILIKE $1 OR city ILIKE $1)"
        );
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn projection_selects_only_requested_columns() {
        assert_eq!(select_list(&[]), VEHICLE_COLUMNS);
        assert_eq!(
            select_list(&[VehicleField::County, VehicleField::ModelYear, VehicleField::County]),
            "id, county, model_year"
        );
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("tesla"), "tesla");
    }
}
