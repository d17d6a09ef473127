//! Error type shared by every calculation in the crate

use thiserror::Error;

/// Errors raised by schedule construction, plan lookup, input validation
/// and assumption loading
#[derive(Debug, Error)]
pub enum ModelError {
    /// Band schedule has a gap, overlap, unsorted bounds or a bad rate
    #[error("Invalid band schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// Repayment plan identifier not recognised (or missing from a loaded table)
    #[error("Unknown repayment plan: {0}")]
    UnknownPlan(String),

    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A loaded assumption file parsed but its content is unusable
    #[error("Failed to parse {file}: {reason}")]
    Parse { file: String, reason: String },
}

impl ModelError {
    pub(crate) fn invalid_input(field: &str, reason: impl Into<String>) -> Self {
        ModelError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_schedule(reason: impl Into<String>) -> Self {
        ModelError::InvalidSchedule {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;

/// Reject negative or non-finite incomes before any computation runs
pub(crate) fn check_income(field: &str, income: f64) -> Result<()> {
    if !income.is_finite() {
        return Err(ModelError::invalid_input(field, format!("must be finite, got {income}")));
    }
    if income < 0.0 {
        return Err(ModelError::invalid_input(field, format!("must be non-negative, got {income}")));
    }
    Ok(())
}

/// Validate a whole income series up front so no partial result is produced
pub(crate) fn check_income_series(field: &str, incomes: &[f64]) -> Result<()> {
    for (i, &income) in incomes.iter().enumerate() {
        check_income(&format!("{field}[{i}]"), income)?;
    }
    Ok(())
}
