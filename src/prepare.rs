use crate::csv_reader::CsvData;
use crate::error::{ChartError, ChartResult};
use crate::transform::{coerce_number, parse_comma_decimal};
use crate::validate::{check_customer, required_columns, validate_columns};
use indexmap::IndexMap;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// A table whose rows carry a year and a customer id.
///
/// Demand/price tables, business-plan tables and aggregated records all filter
/// through the same customer selection.
pub trait YearCustomerTable {
    type Row;

    fn customer_column(&self) -> &str;
    fn rows(&self) -> &[Self::Row];
    fn customer_of<'a>(&self, row: &'a Self::Row) -> &'a str;
    /// `index` is the zero-based row position, used for error reporting.
    fn year_of(&self, row: &Self::Row, index: usize) -> ChartResult<i32>;

    /// Sorted distinct customer ids.
    fn customers(&self) -> Vec<String> {
        let ids: BTreeSet<&str> = self.rows().iter().map(|r| self.customer_of(r)).collect();
        ids.into_iter().map(str::to_string).collect()
    }
}

/// Rows of one customer, stably sorted by ascending year.
///
/// Fails with the full sorted candidate list when no row matches.
pub fn select_customer<'a, T: YearCustomerTable>(
    table: &'a T,
    customer: &str,
) -> ChartResult<Vec<(i32, &'a T::Row)>> {
    let mut selected = Vec::new();
    for (index, row) in table.rows().iter().enumerate() {
        if table.customer_of(row) == customer {
            selected.push((table.year_of(row, index)?, row));
        }
    }

    if selected.is_empty() {
        check_customer(table.customers(), table.customer_column(), customer)?;
    }

    selected.sort_by_key(|(year, _)| *year);
    Ok(selected)
}

/// Year cells may be written as `2023` or `2023.0`.
pub fn parse_year(value: &str, field: &str, row: usize) -> ChartResult<i32> {
    let trimmed = value.trim();
    trimmed
        .parse::<i32>()
        .ok()
        .or_else(|| {
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|y| y.fract() == 0.0 && y.abs() < i32::MAX as f64)
                .map(|y| y as i32)
        })
        .ok_or_else(|| ChartError::DataFormat {
            field: field.to_string(),
            value: value.to_string(),
            row,
            expected: "an integer year".to_string(),
        })
}

/// A cleaned sales table viewed through its customer and year columns.
pub struct SalesTable<'a> {
    data: &'a CsvData,
    customer_column: String,
    year_column: String,
    customer_idx: usize,
    year_idx: usize,
}

impl<'a> SalesTable<'a> {
    pub fn new(data: &'a CsvData, customer_column: &str, year_column: &str) -> ChartResult<Self> {
        validate_columns(data, &[customer_column, year_column])?;
        Ok(SalesTable {
            data,
            customer_column: customer_column.to_string(),
            year_column: year_column.to_string(),
            customer_idx: data.require_column(customer_column)?,
            year_idx: data.require_column(year_column)?,
        })
    }
}

impl YearCustomerTable for SalesTable<'_> {
    type Row = Vec<String>;

    fn customer_column(&self) -> &str {
        &self.customer_column
    }

    fn rows(&self) -> &[Vec<String>] {
        &self.data.rows
    }

    fn customer_of<'r>(&self, row: &'r Vec<String>) -> &'r str {
        row.get(self.customer_idx).map(String::as_str).unwrap_or("")
    }

    fn year_of(&self, row: &Vec<String>, index: usize) -> ChartResult<i32> {
        let cell = row.get(self.year_idx).map(String::as_str).unwrap_or("");
        parse_year(cell, &self.year_column, index + 1)
    }
}

/// One business-plan row. The three bands are stacked additively.
#[derive(Debug, Clone, PartialEq)]
pub struct BusinessPlanRecord {
    pub year: i32,
    pub customer: String,
    pub min: f64,
    pub base: f64,
    pub max: f64,
}

impl BusinessPlanRecord {
    pub fn bands(&self) -> [f64; 3] {
        [self.min, self.base, self.max]
    }

    pub fn total(&self) -> f64 {
        self.min + self.base + self.max
    }
}

pub const BUSINESS_PLAN_BANDS: [&str; 3] = ["min", "base", "max"];

#[derive(Debug, Clone, PartialEq)]
pub struct BusinessPlanTable {
    pub records: Vec<BusinessPlanRecord>,
    customer_column: String,
}

impl BusinessPlanTable {
    /// Missing band values count as 0; negative or non-numeric ones are rejected.
    pub fn from_csv(data: &CsvData, customer_column: &str, year_column: &str) -> ChartResult<Self> {
        let mut required = vec![customer_column, year_column];
        required.extend(BUSINESS_PLAN_BANDS);
        validate_columns(data, &required)?;

        let customer_idx = data.require_column(customer_column)?;
        let year_idx = data.require_column(year_column)?;
        let band_idx = BUSINESS_PLAN_BANDS
            .iter()
            .map(|band| data.require_column(band))
            .collect::<ChartResult<Vec<usize>>>()?;

        let mut records = Vec::with_capacity(data.len());
        for (i, row) in data.rows.iter().enumerate() {
            let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");
            let mut bands = [0.0; 3];
            for (slot, (&idx, band)) in bands.iter_mut().zip(band_idx.iter().zip(BUSINESS_PLAN_BANDS)) {
                let value = parse_comma_decimal(cell(idx), band, i + 1)?.unwrap_or(0.0);
                if value < 0.0 {
                    return Err(ChartError::DataFormat {
                        field: band.to_string(),
                        value: cell(idx).to_string(),
                        row: i + 1,
                        expected: "a non-negative number".to_string(),
                    });
                }
                *slot = value;
            }
            records.push(BusinessPlanRecord {
                year: parse_year(cell(year_idx), year_column, i + 1)?,
                customer: cell(customer_idx).to_string(),
                min: bands[0],
                base: bands[1],
                max: bands[2],
            });
        }

        debug!(records = records.len(), "loaded business plan");
        Ok(BusinessPlanTable {
            records,
            customer_column: customer_column.to_string(),
        })
    }

    /// One record per year for the customer, ascending; the first row of a repeated year wins.
    pub fn for_customer(&self, customer: &str) -> ChartResult<Vec<BusinessPlanRecord>> {
        let mut selected: Vec<BusinessPlanRecord> = Vec::new();
        for (year, record) in select_customer(self, customer)? {
            if selected.last().map(|r| r.year) != Some(year) {
                selected.push(record.clone());
            }
        }
        Ok(selected)
    }
}

impl YearCustomerTable for BusinessPlanTable {
    type Row = BusinessPlanRecord;

    fn customer_column(&self) -> &str {
        &self.customer_column
    }

    fn rows(&self) -> &[BusinessPlanRecord] {
        &self.records
    }

    fn customer_of<'r>(&self, row: &'r BusinessPlanRecord) -> &'r str {
        &row.customer
    }

    fn year_of(&self, row: &BusinessPlanRecord, _index: usize) -> ChartResult<i32> {
        Ok(row.year)
    }
}

/// What the chart layer asks of a cleaned table.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRequest {
    pub customer: String,
    pub customer_column: String,
    pub year_column: String,
    pub suppliers: Vec<String>,
    pub price_columns: Vec<String>,
}

impl SeriesRequest {
    pub fn new(customer: &str, customer_column: &str, suppliers: Vec<String>) -> Self {
        SeriesRequest {
            customer: customer.to_string(),
            customer_column: customer_column.to_string(),
            year_column: "year".to_string(),
            suppliers,
            price_columns: Vec::new(),
        }
    }

    pub fn with_year_column(mut self, year_column: &str) -> Self {
        self.year_column = year_column.to_string();
        self
    }

    pub fn with_price_columns(mut self, price_columns: Vec<String>) -> Self {
        self.price_columns = price_columns;
        self
    }
}

/// Series aligned 1:1 with `years`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSeries {
    pub customer: String,
    pub years: Vec<i32>,
    pub suppliers: IndexMap<String, Vec<f64>>,
    pub demand: Vec<f64>,
    pub prices: IndexMap<String, Vec<Option<f64>>>,
}

impl PreparedSeries {
    /// Sum of supplier volumes per year. Values past the end of a short series count as 0.
    pub fn stack_totals(&self) -> Vec<f64> {
        (0..self.years.len())
            .map(|i| self.suppliers.values().filter_map(|v| v.get(i)).sum())
            .collect()
    }

    /// Fails unless every series has exactly one value per year.
    pub fn check_aligned(&self) -> ChartResult<()> {
        let expected = self.years.len();
        let lengths = self
            .suppliers
            .iter()
            .map(|(name, v)| (name.as_str(), v.len()))
            .chain(std::iter::once(("demand", self.demand.len())))
            .chain(self.prices.iter().map(|(name, v)| (name.as_str(), v.len())));
        for (name, len) in lengths {
            if len != expected {
                return Err(ChartError::InvalidConfig(format!(
                    "series '{}' has {} values for {} years",
                    name, len, expected
                )));
            }
        }
        Ok(())
    }

    pub fn max_demand(&self) -> Option<f64> {
        self.demand.iter().copied().fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    /// Highest value of one price series, if it has any.
    pub fn max_price(&self, column: &str) -> Option<f64> {
        self.prices
            .get(column)?
            .iter()
            .flatten()
            .copied()
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }

    pub fn has_values(&self) -> bool {
        self.demand.iter().any(|v| *v > 0.0)
            || self.stack_totals().iter().any(|v| *v > 0.0)
            || self.prices.values().flatten().any(Option::is_some)
    }
}

/// Filter to one customer, sort by year and align every requested series to the year axis.
///
/// Volumes (suppliers, demand) missing for a year become 0; prices become missing.
/// Price columns absent from the table are skipped with a warning.
pub fn prepare_series(table: &CsvData, request: &SeriesRequest) -> ChartResult<PreparedSeries> {
    validate_columns(
        table,
        &required_columns(&request.customer_column, &request.year_column, &request.suppliers),
    )?;

    let sales = SalesTable::new(table, &request.customer_column, &request.year_column)?;
    let rows = select_customer(&sales, &request.customer)?;

    // First row wins when a year repeats.
    let mut by_year: Vec<(i32, &Vec<String>)> = Vec::new();
    for (year, row) in rows {
        if by_year.last().map(|(y, _)| *y) != Some(year) {
            by_year.push((year, row));
        }
    }
    let years: Vec<i32> = by_year.iter().map(|(y, _)| *y).collect();

    let volume_series = |column: &str| -> ChartResult<Vec<f64>> {
        let idx = table.require_column(column)?;
        by_year
            .iter()
            .enumerate()
            .map(|(i, (_, row))| {
                let cell = row.get(idx).map(String::as_str).unwrap_or("");
                Ok(parse_comma_decimal(cell, column, i + 1)?.unwrap_or(0.0))
            })
            .collect()
    };

    let mut suppliers = IndexMap::new();
    for supplier in &request.suppliers {
        suppliers.insert(supplier.clone(), volume_series(supplier)?);
    }
    let demand = volume_series("demand")?;

    let mut prices = IndexMap::new();
    for column in &request.price_columns {
        let Some(idx) = table.column_index(column) else {
            warn!(column = %column, "price column not found, skipping");
            continue;
        };
        let values = by_year
            .iter()
            .map(|(_, row)| row.get(idx).and_then(|cell| coerce_number(cell)))
            .collect();
        prices.insert(column.clone(), values);
    }

    debug!(
        customer = %request.customer,
        years = years.len(),
        suppliers = suppliers.len(),
        prices = prices.len(),
        "prepared chart series"
    );

    Ok(PreparedSeries {
        customer: request.customer.clone(),
        years,
        suppliers,
        demand,
        prices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv_reader::read_csv_bytes;
    use proptest::prelude::*;

    fn scenario_table() -> CsvData {
        read_csv_bytes(
            b"year,customer,demand,covestro,wanhua,pocket price,apac_pp\n\
              2023,ACME,,120,60,11,\n\
              2022,ACME,,100,50,10.0,10.5\n\
              2025,ACME,300,,,,\n\
              2024,ACME,,130,70,12,n/a\n\
              2023,BETA,10,5,5,1,1\n\
              2022,GAMMA,10,5,5,1,1\n",
        )
        .unwrap()
    }

    fn request(customer: &str) -> SeriesRequest {
        SeriesRequest::new(customer, "customer", vec!["covestro".to_string(), "wanhua".to_string()])
            .with_price_columns(vec!["pocket price".to_string(), "apac_pp".to_string()])
    }

    #[test]
    fn test_prepare_sorts_and_aligns() {
        let series = prepare_series(&scenario_table(), &request("ACME")).unwrap();
        assert_eq!(series.years, vec![2022, 2023, 2024, 2025]);
        assert_eq!(series.suppliers["covestro"], vec![100.0, 120.0, 130.0, 0.0]);
        assert_eq!(series.suppliers["wanhua"], vec![50.0, 60.0, 70.0, 0.0]);
        assert_eq!(series.demand, vec![0.0, 0.0, 0.0, 300.0]);
        assert_eq!(series.stack_totals(), vec![150.0, 180.0, 200.0, 0.0]);
        assert_eq!(series.prices["pocket price"], vec![Some(10.0), Some(11.0), Some(12.0), None]);
        assert_eq!(series.prices["apac_pp"], vec![Some(10.5), None, None, None]);
        assert_eq!(series.max_demand(), Some(300.0));
        assert_eq!(series.max_price("pocket price"), Some(12.0));
    }

    #[test]
    fn test_prepare_unknown_customer_lists_candidates() {
        match prepare_series(&scenario_table(), &request("NOBODY")) {
            Err(ChartError::CustomerNotFound { available, .. }) => {
                assert_eq!(available, vec!["ACME", "BETA", "GAMMA"]);
            }
            other => panic!("Expected CustomerNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_reads_exact_header_case() {
        let table = read_csv_bytes(b"year,customer,demand,Covestro,covestro\n2023,ACME,10,999,5\n").unwrap();
        let req = SeriesRequest::new("ACME", "customer", vec!["covestro".to_string()]);
        let series = prepare_series(&table, &req).unwrap();
        assert_eq!(series.suppliers["covestro"], vec![5.0]);

        let upper = SeriesRequest::new("ACME", "customer", vec!["COVESTRO".to_string()]);
        match prepare_series(&table, &upper) {
            Err(ChartError::MissingColumns { missing }) => assert_eq!(missing, vec!["COVESTRO"]),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_misaligned_series_is_rejected() {
        let mut series = prepare_series(&scenario_table(), &request("ACME")).unwrap();
        assert!(series.check_aligned().is_ok());

        series.suppliers.insert("wanhua".to_string(), vec![50.0]);
        assert_eq!(series.stack_totals(), vec![150.0, 120.0, 130.0, 0.0]);
        match series.check_aligned() {
            Err(ChartError::InvalidConfig(msg)) => assert!(msg.contains("'wanhua'")),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_missing_supplier_column() {
        let mut req = request("ACME");
        req.suppliers.push("basf".to_string());
        match prepare_series(&scenario_table(), &req) {
            Err(ChartError::MissingColumns { missing }) => assert_eq!(missing, vec!["basf"]),
            other => panic!("Expected MissingColumns, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_skips_absent_price_column() {
        let req = request("ACME").with_price_columns(vec!["seap_pp".to_string(), "pocket price".to_string()]);
        let series = prepare_series(&scenario_table(), &req).unwrap();
        assert_eq!(series.prices.keys().collect::<Vec<_>>(), vec!["pocket price"]);
    }

    #[test]
    fn test_prepare_rejects_bad_volume() {
        let table = read_csv_bytes(b"year,customer,demand,covestro\n2023,ACME,10,lots\n").unwrap();
        let req = SeriesRequest::new("ACME", "customer", vec!["covestro".to_string()]);
        assert!(matches!(prepare_series(&table, &req), Err(ChartError::DataFormat { .. })));
    }

    #[test]
    fn test_prepare_custom_year_column() {
        let table = read_csv_bytes(b"fy,customer,demand,covestro\n2024.0,ACME,10,4\n").unwrap();
        let req = SeriesRequest::new("ACME", "customer", vec!["covestro".to_string()]).with_year_column("fy");
        let series = prepare_series(&table, &req).unwrap();
        assert_eq!(series.years, vec![2024]);
    }

    #[test]
    fn test_parse_year_rejects_text() {
        assert_eq!(parse_year("2023", "year", 1).unwrap(), 2023);
        assert!(matches!(parse_year("FY23", "year", 2), Err(ChartError::DataFormat { .. })));
        assert!(parse_year("2023.5", "year", 2).is_err());
    }

    #[test]
    fn test_business_plan_fills_missing_with_zero() {
        let data = read_csv_bytes(
            b"year,customer,min,base,max\n2024,ACME,,700,20\n2023,ACME,10,600,5\n2023,BETA,1,2,3\n",
        )
        .unwrap();
        let table = BusinessPlanTable::from_csv(&data, "customer", "year").unwrap();
        let acme = table.for_customer("ACME").unwrap();
        assert_eq!(acme.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2023, 2024]);
        assert_eq!(acme[0].total(), 615.0);
        assert_eq!(acme[1].bands(), [0.0, 700.0, 20.0]);
    }

    #[test]
    fn test_business_plan_unknown_customer() {
        let data = read_csv_bytes(b"year,customer,min,base,max\n2023,ACME,1,2,3\n").unwrap();
        let table = BusinessPlanTable::from_csv(&data, "customer", "year").unwrap();
        let err = table.for_customer("NOBODY").unwrap_err();
        assert_eq!(err.available_customers(), Some(&["ACME".to_string()][..]));
    }

    #[test]
    fn test_business_plan_rejects_negative_band() {
        let data = read_csv_bytes(b"year,customer,min,base,max\n2023,ACME,-1,2,3\n").unwrap();
        assert!(matches!(
            BusinessPlanTable::from_csv(&data, "customer", "year"),
            Err(ChartError::DataFormat { .. })
        ));
        let missing = read_csv_bytes(b"year,customer,min,base\n2023,ACME,1,2\n").unwrap();
        assert!(matches!(
            BusinessPlanTable::from_csv(&missing, "customer", "year"),
            Err(ChartError::MissingColumns { .. })
        ));
    }

    proptest! {
        #[test]
        fn series_length_matches_distinct_years(years in proptest::collection::vec(2000i32..2040, 1..30)) {
            let mut csv = String::from("year,customer,demand,covestro\n");
            for (i, y) in years.iter().enumerate() {
                csv.push_str(&format!("{},ACME,{},{}\n", y, i, i));
            }
            let table = read_csv_bytes(csv.as_bytes()).unwrap();
            let req = SeriesRequest::new("ACME", "customer", vec!["covestro".to_string()]);
            let series = prepare_series(&table, &req).unwrap();

            let distinct: BTreeSet<i32> = years.iter().copied().collect();
            prop_assert_eq!(series.years.len(), distinct.len());
            prop_assert_eq!(series.demand.len(), distinct.len());
            prop_assert_eq!(series.suppliers["covestro"].len(), distinct.len());
            prop_assert!(series.years.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
