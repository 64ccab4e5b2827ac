//! Error types for the dispatch ledger

use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Dispatch ledger errors
///
/// Every failure is local to the call that raised it: nothing is committed,
/// and the caller retries with corrected arguments or a different caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller lacks the role required by the operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Value outside its declared domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Origin and destination are the same point
    #[error("Invalid route: origin equals destination")]
    InvalidRoute,

    /// Driver is not accepting requests
    #[error("Driver unavailable: status is {0}")]
    DriverUnavailable(String),

    /// Attached value below the required threshold or mismatched remainder
    #[error("Insufficient payment: required {required}, attached {attached}")]
    InsufficientPayment {
        /// Value the operation required
        required: rust_decimal::Decimal,
        /// Value actually attached to the call
        attached: rust_decimal::Decimal,
    },

    /// Operation attempted on a request or driver in an incompatible phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Request id out of range
    #[error("Request not found: {0}")]
    NotFound(u64),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientPayment {
            required: Decimal::from(1_000),
            attached: Decimal::from(500),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient payment: required 1000, attached 500"
        );

        assert_eq!(Error::NotFound(7).to_string(), "Request not found: 7");
    }
}
