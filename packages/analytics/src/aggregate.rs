//! Pure reductions from a filtered record set to chart views.
//!
//! Group-by counts keep keys in first-encountered order and every sort is
//! stable, so ties always resolve to the key seen first.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use ev_dashboard_analytics_models::{
    CafvBucket, CountyCount, DashboardMetrics, FilterOptions, MakeShare, ModelCount,
    OTHERS_LABEL, RangeBucket, YearBounds, YearlyCount,
};
use ev_dashboard_filter::{DEFAULT_MAX_YEAR, DEFAULT_MIN_YEAR};
use ev_dashboard_vehicle_models::{UNKNOWN, VehicleRecord};

/// Electric-range bands as `(label, min, max)`; `None` is unbounded.
pub const RANGE_BANDS: [(&str, u32, Option<u32>); 6] = [
    ("0-50", 0, Some(50)),
    ("51-100", 51, Some(100)),
    ("101-150", 101, Some(150)),
    ("151-200", 151, Some(200)),
    ("201-250", 201, Some(250)),
    ("250+", 251, None),
];

/// Counts occurrences per key, preserving first-encountered order.
fn count_by_key<I, S>(keys: I) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: Vec<(String, u64)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for key in keys {
        let key = key.as_ref();
        if let Some(&i) = index.get(key) {
            counts[i].1 += 1;
        } else {
            index.insert(key.to_string(), counts.len());
            counts.push((key.to_string(), 1));
        }
    }

    counts
}

/// Stable descending sort by count.
fn sort_desc(counts: &mut [(String, u64)]) {
    counts.sort_by(|a, b| b.1.cmp(&a.1));
}

/// Key with the highest count; the earliest key wins ties.
fn top_key(counts: &[(String, u64)]) -> Option<&str> {
    let mut best: Option<&(String, u64)> = None;
    for entry in counts {
        if best.is_none_or(|b| entry.1 > b.1) {
            best = Some(entry);
        }
    }
    best.map(|(key, _)| key.as_str())
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

fn known_year(record: &VehicleRecord) -> Option<i32> {
    record.model_year.filter(|&y| y > 0)
}

/// Rounds half toward positive infinity.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Percentage change from `previous` to `current`; 0 when `previous` is 0.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn growth_rate(current: u64, previous: u64) -> f64 {
    if previous == 0 {
        return 0.0;
    }
    (current as f64 - previous as f64) / previous as f64 * 100.0
}

/// `ceil(total / page_size)`, or 0 when `page_size` is 0.
#[must_use]
pub const fn total_pages(total: u64, page_size: u64) -> u64 {
    if page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    }
}

/// Headline metrics for the metric cards.
///
/// PHEV is the complement of BEV: any label without `BEV` counts as PHEV.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn dashboard_metrics(records: &[VehicleRecord]) -> DashboardMetrics {
    let total_vehicles = records.len() as u64;
    let bev_count = records.iter().filter(|r| r.ev_type.is_bev()).count() as u64;

    let (range_sum, range_n) = records
        .iter()
        .filter(|r| r.electric_range > 0)
        .fold((0u64, 0u64), |(sum, n), r| {
            (sum + u64::from(r.electric_range), n + 1)
        });
    let avg_electric_range = if range_n == 0 {
        0
    } else {
        round_half_up(range_sum as f64 / range_n as f64) as u32
    };

    let counties = count_by_key(records.iter().filter_map(|r| non_empty(&r.county)));
    let makes = count_by_key(records.iter().filter_map(|r| non_empty(&r.make)));

    let year_over_year_growth = records
        .iter()
        .filter_map(known_year)
        .max()
        .map_or(0.0, |latest| {
            let current = records
                .iter()
                .filter(|r| known_year(r) == Some(latest))
                .count() as u64;
            let previous = records
                .iter()
                .filter(|r| known_year(r) == Some(latest - 1))
                .count() as u64;
            round_half_up(growth_rate(current, previous) * 10.0) / 10.0
        });

    DashboardMetrics {
        total_vehicles,
        bev_count,
        phev_count: total_vehicles - bev_count,
        avg_electric_range,
        top_county: top_key(&counties).unwrap_or(UNKNOWN).to_string(),
        top_make: top_key(&makes).unwrap_or(UNKNOWN).to_string(),
        year_over_year_growth,
    }
}

/// The `limit` counties with the most records, descending.
#[must_use]
pub fn county_distribution(records: &[VehicleRecord], limit: usize) -> Vec<CountyCount> {
    let mut counts = count_by_key(records.iter().filter_map(|r| non_empty(&r.county)));
    sort_desc(&mut counts);
    counts
        .into_iter()
        .take(limit)
        .map(|(county, count)| CountyCount { county, count })
        .collect()
}

/// The `limit` makes with the most records and their share of all records,
/// followed by an `"Others"` row for whatever the top makes leave out.
///
/// Shares are taken over every record, including those without a make, so
/// the rows always sum to 100%.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn make_distribution(records: &[VehicleRecord], limit: usize) -> Vec<MakeShare> {
    let total = records.len() as u64;
    if total == 0 {
        return Vec::new();
    }
    let share = |count: u64| count as f64 / total as f64 * 100.0;

    let mut counts = count_by_key(records.iter().filter_map(|r| non_empty(&r.make)));
    sort_desc(&mut counts);

    let mut rows: Vec<MakeShare> = counts
        .into_iter()
        .take(limit)
        .map(|(make, count)| MakeShare {
            make,
            count,
            percentage: share(count),
        })
        .collect();

    let covered: u64 = rows.iter().map(|m| m.count).sum();
    let others = total - covered;
    if others > 0 {
        rows.push(MakeShare {
            make: OTHERS_LABEL.to_string(),
            count: others,
            percentage: share(others),
        });
    }

    rows
}

/// BEV/PHEV counts per model year, ascending. Records without a model year
/// are left out.
#[must_use]
pub fn yearly_trends(records: &[VehicleRecord]) -> Vec<YearlyCount> {
    let mut years: BTreeMap<i32, (u64, u64)> = BTreeMap::new();

    for record in records {
        let Some(year) = known_year(record) else {
            continue;
        };
        let entry = years.entry(year).or_default();
        if record.ev_type.is_bev() {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }

    years
        .into_iter()
        .map(|(year, (bev, phev))| YearlyCount {
            year,
            total: bev + phev,
            bev_count: bev,
            phev_count: phev,
        })
        .collect()
}

/// Record counts for each of the [`RANGE_BANDS`].
#[must_use]
pub fn range_distribution(records: &[VehicleRecord]) -> Vec<RangeBucket> {
    let mut counts = [0u64; RANGE_BANDS.len()];

    for record in records {
        let range = record.electric_range;
        if let Some(i) = RANGE_BANDS
            .iter()
            .position(|&(_, min, max)| range >= min && max.is_none_or(|max| range <= max))
        {
            counts[i] += 1;
        }
    }

    RANGE_BANDS
        .iter()
        .zip(counts)
        .map(|(&(label, _, _), count)| RangeBucket {
            label: label.to_string(),
            count,
        })
        .collect()
}

/// Record counts per CAFV eligibility status, descending.
#[must_use]
pub fn cafv_breakdown(records: &[VehicleRecord]) -> Vec<CafvBucket> {
    let mut counts = count_by_key(records.iter().map(VehicleRecord::display_cafv));
    sort_desc(&mut counts);
    counts
        .into_iter()
        .map(|(status, count)| CafvBucket { status, count })
        .collect()
}

/// The `limit` most common `"make model"` pairs, descending.
#[must_use]
pub fn top_models(records: &[VehicleRecord], limit: usize) -> Vec<ModelCount> {
    let mut counts = count_by_key(records.iter().filter_map(VehicleRecord::make_model));
    sort_desc(&mut counts);
    counts
        .into_iter()
        .take(limit)
        .map(|(model, count)| ModelCount { model, count })
        .collect()
}

/// Distinct sorted counties and makes plus the model-year span.
///
/// Falls back to the default year span when no record has a model year.
#[must_use]
pub fn filter_options(records: &[VehicleRecord]) -> FilterOptions {
    let counties: BTreeSet<&str> = records.iter().filter_map(|r| non_empty(&r.county)).collect();
    let makes: BTreeSet<&str> = records.iter().filter_map(|r| non_empty(&r.make)).collect();
    let min = records.iter().filter_map(known_year).min();
    let max = records.iter().filter_map(known_year).max();

    FilterOptions {
        counties: counties.into_iter().map(str::to_string).collect(),
        makes: makes.into_iter().map(str::to_string).collect(),
        years: YearBounds {
            min: min.unwrap_or(DEFAULT_MIN_YEAR),
            max: max.unwrap_or(DEFAULT_MAX_YEAR),
        },
    }
}
