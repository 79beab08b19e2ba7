use crate::domain::checkout::CheckoutState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Gateway error: {0}")]
    GatewayError(#[from] GatewayError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Cannot {action} while checkout is {state}")]
    InvalidState {
        action: &'static str,
        state: CheckoutState,
    },
    #[error("Payment attempt was cancelled")]
    Cancelled,
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failures to reach the payment gateway or to understand its reply.
///
/// A gateway that answers "failed" is not an error; these variants mean the
/// question itself could not be asked or answered.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("gateway responded with {status}: {message}")]
    Api { status: u16, message: String },
    #[error("unreadable gateway response: {0}")]
    Decode(String),
}

pub type Result<T, E = PaymentError> = std::result::Result<T, E>;
