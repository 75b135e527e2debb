// Column and customer checks run before any derived computation.

use crate::csv_reader::CsvData;
use crate::error::{ChartError, ChartResult};
use std::collections::BTreeSet;

/// Names a chart over a cleaned table needs: customer, year, `demand`, then every supplier.
pub fn required_columns<'a>(
    customer_column: &'a str,
    year_column: &'a str,
    suppliers: &'a [String],
) -> Vec<&'a str> {
    let mut required = vec![customer_column, year_column, "demand"];
    required.extend(suppliers.iter().map(String::as_str));
    required
}

/// Fails with every absent name, in the order requested. Column order in the table is irrelevant.
pub fn validate_columns(table: &CsvData, required: &[&str]) -> ChartResult<()> {
    let mut seen = BTreeSet::new();
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !table.has_column(name))
        .filter(|name| seen.insert(name.to_string()))
        .map(|name| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ChartError::MissingColumns { missing })
    }
}

/// Sorted distinct values of a column.
pub fn distinct_values(table: &CsvData, column: &str) -> ChartResult<Vec<String>> {
    let idx = table.require_column(column)?;
    let values: BTreeSet<&str> = (0..table.len()).map(|row| table.cell(row, idx)).collect();
    Ok(values.into_iter().map(str::to_string).collect())
}

/// Fails with the full sorted list of valid ids when `customer` is not a value of `column`.
pub fn validate_customer(table: &CsvData, column: &str, customer: &str) -> ChartResult<()> {
    check_customer(distinct_values(table, column)?, column, customer)
}

/// Customer check against an already collected, sorted candidate list.
pub fn check_customer(available: Vec<String>, column: &str, customer: &str) -> ChartResult<()> {
    if available.iter().any(|c| c == customer) {
        Ok(())
    } else {
        Err(ChartError::CustomerNotFound {
            customer: customer.to_string(),
            column: column.to_string(),
            available,
        })
    }
}
