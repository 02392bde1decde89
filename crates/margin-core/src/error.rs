use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarginError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Ad-hoc amortization profile requires at least one table entry")]
    EmptyAmortizationTable,

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("IRR undefined: {0}")]
    UndefinedIrr(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Export error: {0}")]
    Export(String),
}

impl MarginError {
    /// True for errors that abort a calculation before any schedule exists.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MarginError::InvalidInput { .. }
                | MarginError::EmptyAmortizationTable
                | MarginError::DivisionByZero { .. }
                | MarginError::DateError(_)
        )
    }

    /// True for root-finding failures on a single cash-flow array.
    pub fn is_solver_failure(&self) -> bool {
        matches!(
            self,
            MarginError::ConvergenceFailure { .. } | MarginError::UndefinedIrr(_)
        )
    }
}

impl From<serde_json::Error> for MarginError {
    fn from(e: serde_json::Error) -> Self {
        MarginError::SerializationError(e.to_string())
    }
}

#[cfg(feature = "export")]
impl From<csv::Error> for MarginError {
    fn from(e: csv::Error) -> Self {
        MarginError::Export(e.to_string())
    }
}
