pub mod error;
pub mod loan;
pub mod time_value;
pub mod types;

#[cfg(feature = "export")]
pub mod export;

pub use error::MarginError;
pub use loan::margin::{calculate_all_in_margin, CalculationResult};
pub use loan::params::{LoanParameters, PaymentFrequency, ProfileKind};
pub use types::*;

/// Standard result type for all margin operations
pub type MarginResult<T> = Result<T, MarginError>;
