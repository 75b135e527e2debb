// Raw transactional rows -> per-customer per-year aggregates -> demand.

pub mod aggregate;
pub mod dates;
pub mod demand;

pub use aggregate::{aggregate_transactions, normalize_headers, regroup, AggregatedRecord, CustomerMapping, RawColumns};
pub use dates::{DateFormat, DateParser, MalformedDate};
pub use demand::{synthesize_demand, AggregatedTable, CompetitorList};

use crate::error::{ChartError, ChartResult};

/// Numeric coercion where unparseable means missing.
pub fn coerce_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Locale-formatted decimal (`1,5`). Empty cells are missing; anything else non-numeric is an error.
pub fn parse_comma_decimal(value: &str, field: &str, row: usize) -> ChartResult<Option<f64>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
        .ok_or_else(|| ChartError::DataFormat {
            field: field.to_string(),
            value: value.to_string(),
            row,
            expected: "a decimal number".to_string(),
        })
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
