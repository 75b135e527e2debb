use super::{coerce_number, parse_comma_decimal, round2, DateParser};
use crate::csv_reader::CsvData;
use crate::error::ChartResult;
use crate::validate::validate_columns;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Column names of a raw transactional export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawColumns {
    pub date: String,
    pub customer: String,
    pub material: String,
    pub volume: String,
    pub net_price: String,
    pub pocket_price: String,
}

impl Default for RawColumns {
    fn default() -> Self {
        RawColumns {
            date: "date".to_string(),
            customer: "ship_to_customer".to_string(),
            material: "material".to_string(),
            volume: "volume".to_string(),
            net_price: "nasp".to_string(),
            pocket_price: "pp".to_string(),
        }
    }
}

/// Many-to-one map from free-text customer name variants to a canonical id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerMapping(IndexMap<String, String>);

impl CustomerMapping {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        CustomerMapping(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn canonical(&self, raw_name: &str) -> Option<&str> {
        self.0.get(raw_name).map(String::as_str)
    }

    /// Distinct canonical ids, in first-seen order.
    pub fn canonical_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for id in self.0.values() {
            if !ids.contains(&id.as_str()) {
                ids.push(id);
            }
        }
        ids
    }
}

/// One row per (year, canonical customer).
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRecord {
    pub year: i32,
    pub customer: String,
    /// Mean pocket price; missing when no row of the group had a parseable price.
    pub price: Option<f64>,
    pub volume: f64,
    pub demand: f64,
    pub competitors: IndexMap<String, f64>,
}

impl AggregatedRecord {
    pub fn new(year: i32, customer: impl Into<String>, price: Option<f64>, volume: f64) -> Self {
        AggregatedRecord {
            year,
            customer: customer.into(),
            price,
            volume,
            demand: volume,
            competitors: IndexMap::new(),
        }
    }

    pub fn competitor_volume(&self) -> f64 {
        self.competitors.values().sum()
    }
}

/// Trim surrounding whitespace from every column name.
pub fn normalize_headers(table: &CsvData) -> CsvData {
    CsvData {
        headers: table.headers.iter().map(|h| h.trim().to_string()).collect(),
        rows: table.rows.clone(),
    }
}

#[derive(Default)]
struct GroupAcc {
    price_sum: f64,
    price_count: usize,
    volume: f64,
    demand: f64,
    competitors: IndexMap<String, f64>,
}

impl GroupAcc {
    fn add_price(&mut self, price: Option<f64>) {
        if let Some(p) = price {
            self.price_sum += p;
            self.price_count += 1;
        }
    }

    fn finish(self, year: i32, customer: String) -> AggregatedRecord {
        let price = (self.price_count > 0).then(|| round2(self.price_sum / self.price_count as f64));
        AggregatedRecord {
            year,
            customer,
            price,
            volume: round2(self.volume),
            demand: round2(self.demand),
            competitors: self.competitors.into_iter().map(|(k, v)| (k, round2(v))).collect(),
        }
    }
}

/// Group raw transaction rows into one record per (year, mapped customer).
///
/// Rows are dropped, not errored, when the date does not match a lenient parser,
/// the net price is missing, or the customer name has no mapping. A volume that is
/// not numeric after comma substitution, or a date rejected by a strict parser, fails.
pub fn aggregate_transactions(
    table: &CsvData,
    columns: &RawColumns,
    dates: DateParser,
    mapping: &CustomerMapping,
) -> ChartResult<Vec<AggregatedRecord>> {
    let table = normalize_headers(table);
    validate_columns(
        &table,
        &[
            columns.date.as_str(),
            columns.customer.as_str(),
            columns.material.as_str(),
            columns.volume.as_str(),
            columns.net_price.as_str(),
            columns.pocket_price.as_str(),
        ],
    )?;

    let date_idx = table.require_column(&columns.date)?;
    let customer_idx = table.require_column(&columns.customer)?;
    let volume_idx = table.require_column(&columns.volume)?;
    let net_idx = table.require_column(&columns.net_price)?;
    let pocket_idx = table.require_column(&columns.pocket_price)?;

    let mut groups: BTreeMap<(i32, String), GroupAcc> = BTreeMap::new();
    let mut skipped_dates = 0usize;
    let mut incomplete = 0usize;
    let mut unmapped = 0usize;

    for row in 0..table.len() {
        let line = row + 1;
        let Some(year) = dates.parse_year(table.cell(row, date_idx), line)? else {
            skipped_dates += 1;
            continue;
        };

        let pocket_price = coerce_number(table.cell(row, pocket_idx));
        let volume = parse_comma_decimal(table.cell(row, volume_idx), &columns.volume, line)?;

        if coerce_number(table.cell(row, net_idx)).is_none() {
            incomplete += 1;
            continue;
        }

        let Some(customer) = mapping.canonical(table.cell(row, customer_idx)) else {
            unmapped += 1;
            continue;
        };

        let acc = groups.entry((year, customer.to_string())).or_default();
        acc.add_price(pocket_price);
        let volume = volume.unwrap_or(0.0);
        acc.volume += volume;
        acc.demand += volume;
    }

    if skipped_dates > 0 {
        warn!(rows = skipped_dates, pattern = dates.format.pattern(), "skipped rows with malformed dates");
    }
    debug!(
        groups = groups.len(),
        incomplete,
        unmapped,
        "aggregated transaction rows"
    );

    Ok(groups
        .into_iter()
        .map(|((year, customer), acc)| acc.finish(year, customer))
        .collect())
}

/// Re-aggregate records by (year, customer): mean price, summed volumes.
///
/// A table that is already unique per key comes back unchanged.
pub fn regroup(records: &[AggregatedRecord]) -> Vec<AggregatedRecord> {
    let mut groups: BTreeMap<(i32, String), GroupAcc> = BTreeMap::new();
    for record in records {
        let acc = groups.entry((record.year, record.customer.clone())).or_default();
        acc.add_price(record.price);
        acc.volume += record.volume;
        acc.demand += record.demand;
        for (name, value) in &record.competitors {
            *acc.competitors.entry(name.clone()).or_insert(0.0) += value;
        }
    }
    groups
        .into_iter()
        .map(|((year, customer), acc)| acc.finish(year, customer))
        .collect()
}
