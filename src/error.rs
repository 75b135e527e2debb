use thiserror::Error;

pub type ChartResult<T> = Result<T, ChartError>;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Missing required columns: [{}]", quoted(.missing))]
    MissingColumns { missing: Vec<String> },

    #[error(
        "Customer '{customer}' not found in column '{column}'. Available customers: [{}]",
        quoted(.available)
    )]
    CustomerNotFound {
        customer: String,
        column: String,
        available: Vec<String>,
    },

    #[error("Failed to parse {field} value '{value}' at row {row} (expected {expected})")]
    DataFormat {
        field: String,
        value: String,
        row: usize,
        expected: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to render chart: {0}")]
    Render(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl ChartError {
    /// Candidate ids carried by a `CustomerNotFound`, for callers that offer a picker.
    pub fn available_customers(&self) -> Option<&[String]> {
        match self {
            ChartError::CustomerNotFound { available, .. } => Some(available),
            _ => None,
        }
    }
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_lists_every_name() {
        let err = ChartError::MissingColumns {
            missing: vec!["demand".to_string(), "wanhua".to_string()],
        };
        assert_eq!(err.to_string(), "Missing required columns: ['demand', 'wanhua']");
    }

    #[test]
    fn test_customer_not_found_message_carries_candidates() {
        let err = ChartError::CustomerNotFound {
            customer: "NOBODY".to_string(),
            column: "customer".to_string(),
            available: vec!["ACME".to_string(), "BETA".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Customer 'NOBODY' not found in column 'customer'. Available customers: ['ACME', 'BETA']"
        );
        assert_eq!(err.available_customers().unwrap(), &["ACME", "BETA"]);
    }
}
