use crate::error::{ChartError, ChartResult};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Textual date layout used by a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    /// `MM.YYYY`
    #[serde(rename = "MM.YYYY")]
    MonthYear,
    /// `DD.MM.YYYY`
    #[serde(rename = "DD.MM.YYYY")]
    DayMonthYear,
}

impl DateFormat {
    pub fn pattern(&self) -> &'static str {
        match self {
            DateFormat::MonthYear => "MM.YYYY",
            DateFormat::DayMonthYear => "DD.MM.YYYY",
        }
    }

    /// Digit-group lengths separated by dots.
    fn groups(&self) -> &'static [usize] {
        match self {
            DateFormat::MonthYear => &[2, 4],
            DateFormat::DayMonthYear => &[2, 2, 4],
        }
    }
}

/// What a parser does with a cell that does not match its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedDate {
    Skip,
    Reject,
}

/// A date parser variant, chosen explicitly per data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateParser {
    pub format: DateFormat,
    pub on_malformed: MalformedDate,
}

impl DateParser {
    /// Monthly exports: non-matching rows are dropped.
    pub fn month_year() -> Self {
        DateParser {
            format: DateFormat::MonthYear,
            on_malformed: MalformedDate::Skip,
        }
    }

    /// Daily exports: a non-matching row is a data error.
    pub fn day_month_year() -> Self {
        DateParser {
            format: DateFormat::DayMonthYear,
            on_malformed: MalformedDate::Reject,
        }
    }

    /// `Ok(None)` means the row is excluded.
    pub fn parse(&self, value: &str, row: usize) -> ChartResult<Option<NaiveDate>> {
        match parse_date(self.format, value.trim()) {
            Some(date) => Ok(Some(date)),
            None => match self.on_malformed {
                MalformedDate::Skip => Ok(None),
                MalformedDate::Reject => Err(ChartError::DataFormat {
                    field: "date".to_string(),
                    value: value.to_string(),
                    row,
                    expected: self.format.pattern().to_string(),
                }),
            },
        }
    }

    pub fn parse_year(&self, value: &str, row: usize) -> ChartResult<Option<i32>> {
        Ok(self.parse(value, row)?.map(|d| d.year()))
    }
}

impl Default for DateParser {
    fn default() -> Self {
        DateParser::month_year()
    }
}

fn parse_date(format: DateFormat, value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value.split('.').collect();
    let groups = format.groups();
    if parts.len() != groups.len() {
        return None;
    }
    let shaped = parts
        .iter()
        .zip(groups)
        .all(|(p, &len)| p.len() == len && p.bytes().all(|b| b.is_ascii_digit()));
    if !shaped {
        return None;
    }

    match format {
        DateFormat::MonthYear => NaiveDate::parse_from_str(&format!("01.{}", value), "%d.%m.%Y").ok(),
        DateFormat::DayMonthYear => NaiveDate::parse_from_str(value, "%d.%m.%Y").ok(),
    }
}
