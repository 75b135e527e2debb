use super::{round2, AggregatedRecord};
use crate::csv_reader::CsvData;
use crate::error::{ChartError, ChartResult};
use crate::prepare::YearCustomerTable;
use indexmap::IndexMap;
use tracing::debug;

/// Ordered competitor names of one product line.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorList {
    names: Vec<String>,
}

impl CompetitorList {
    /// Rejects a list containing the reporting entity, a duplicate, or a canonical customer id.
    pub fn new(names: Vec<String>, reporting_entity: &str, customers: &[&str]) -> ChartResult<Self> {
        for (i, name) in names.iter().enumerate() {
            if name.eq_ignore_ascii_case(reporting_entity) {
                return Err(ChartError::InvalidConfig(format!(
                    "competitor list contains the reporting entity '{}'",
                    name
                )));
            }
            if customers.iter().any(|c| c == name) {
                return Err(ChartError::InvalidConfig(format!(
                    "competitor '{}' is also a canonical customer id",
                    name
                )));
            }
            if names[..i].contains(name) {
                return Err(ChartError::InvalidConfig(format!("competitor '{}' listed twice", name)));
            }
        }
        Ok(CompetitorList { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// Fill untracked competitor volumes with 0.0 and derive `demand = volume + sum(competitors)`.
///
/// Competitors come out in list order; values already present on a record are kept.
pub fn synthesize_demand(records: Vec<AggregatedRecord>, competitors: &CompetitorList) -> Vec<AggregatedRecord> {
    let synthesized: Vec<AggregatedRecord> = records
        .into_iter()
        .map(|mut record| {
            let mut ordered: IndexMap<String, f64> = competitors
                .names()
                .iter()
                .map(|name| (name.clone(), record.competitors.get(name).copied().unwrap_or(0.0)))
                .collect();
            for (name, value) in record.competitors.drain(..) {
                ordered.entry(name).or_insert(value);
            }
            record.competitors = ordered;
            record.demand = round2(record.volume + record.competitor_volume());
            record
        })
        .collect();
    debug!(records = synthesized.len(), competitors = competitors.names().len(), "synthesized demand");
    synthesized
}

/// Aggregated records with their presentation column names.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedTable {
    pub records: Vec<AggregatedRecord>,
    pub customer_column: String,
    pub price_column: String,
}

impl AggregatedTable {
    pub fn new(records: Vec<AggregatedRecord>, customer_column: &str, price_column: &str) -> Self {
        AggregatedTable {
            records,
            customer_column: customer_column.to_string(),
            price_column: price_column.to_string(),
        }
    }

    /// Header order: year, customer, price, demand, volume, then competitors in list order.
    pub fn headers(&self) -> Vec<String> {
        let mut headers = vec![
            "year".to_string(),
            self.customer_column.clone(),
            self.price_column.clone(),
            "demand".to_string(),
            "volume".to_string(),
        ];
        if let Some(first) = self.records.first() {
            headers.extend(first.competitors.keys().cloned());
        }
        headers
    }

    pub fn to_csv_data(&self) -> CsvData {
        let headers = self.headers();
        let competitor_names = &headers[5..];
        let rows = self
            .records
            .iter()
            .map(|r| {
                let mut row = vec![
                    r.year.to_string(),
                    r.customer.clone(),
                    r.price.map(|p| p.to_string()).unwrap_or_default(),
                    r.demand.to_string(),
                    r.volume.to_string(),
                ];
                row.extend(
                    competitor_names
                        .iter()
                        .map(|c| r.competitors.get(c).copied().unwrap_or(0.0).to_string()),
                );
                row
            })
            .collect();
        CsvData::new(headers, rows)
    }
}

impl YearCustomerTable for AggregatedTable {
    type Row = AggregatedRecord;

    fn customer_column(&self) -> &str {
        &self.customer_column
    }

    fn rows(&self) -> &[AggregatedRecord] {
        &self.records
    }

    fn customer_of<'a>(&self, row: &'a AggregatedRecord) -> &'a str {
        &row.customer
    }

    fn year_of(&self, row: &AggregatedRecord, _index: usize) -> ChartResult<i32> {
        Ok(row.year)
    }
}
