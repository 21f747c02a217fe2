//! Error types for the financial model
//!
//! Every failure a session can hit is a variant here. None of them are retried:
//! the model is deterministic, so a failed run fails again with the same inputs.

use thiserror::Error;

/// Result alias used throughout the library
pub type ModelResult<T> = Result<T, ModelError>;

/// The main error type for model operations
#[derive(Error, Debug)]
pub enum ModelError {
    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line item the model needs is absent from the historical data
    #[error("historical data is missing '{item}' for {year}")]
    MissingHistoricalItem { item: String, year: i32 },

    /// A historical cell could not be read as a number
    #[error("historical value for '{item}' in column '{column}' is not numeric: '{value}'")]
    InvalidHistoricalValue {
        item: String,
        column: String,
        value: String,
    },

    /// Historical data is present but structurally unusable
    #[error("malformed historical data: {0}")]
    MalformedHistory(String),

    /// An assumption failed validation at load time
    #[error("invalid assumption '{field}': {reason}")]
    InvalidAssumption { field: String, reason: String },

    /// An override path did not resolve to a numeric assumption
    #[error("invalid override '{path}': {reason}")]
    InvalidOverride { path: String, reason: String },

    /// Assets did not equal liabilities plus equity within tolerance
    #[error(
        "balance sheet does not balance in {year}: assets {assets:.2} vs liabilities + equity {liabilities_and_equity:.2} (residual {residual:.2}, tolerance {tolerance:.2})"
    )]
    BalanceSheetImbalance {
        year: i32,
        assets: f64,
        liabilities_and_equity: f64,
        residual: f64,
        tolerance: f64,
    },

    /// Cap table ownership did not sum to 100%
    #[error("ownership after round '{round}' sums to {total_pct:.6}% instead of 100%")]
    OwnershipMismatch { round: String, total_pct: f64 },

    /// A direct engine input was out of range
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ModelError {
    pub(crate) fn assumption(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ModelError::InvalidAssumption {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_user_readable() {
        let err = ModelError::MissingHistoricalItem {
            item: "Revenue".to_string(),
            year: 2024,
        };
        assert_eq!(err.to_string(), "historical data is missing 'Revenue' for 2024");

        let err = ModelError::assumption("tax_rate", "must be within [0, 1]");
        assert_eq!(err.to_string(), "invalid assumption 'tax_rate': must be within [0, 1]");
    }
}
