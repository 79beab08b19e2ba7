//! Observable checkout state: what a rendering layer needs to draw the
//! payment dialog at any moment.

use crate::domain::payment::{Payment, PaymentMethod};
use crate::domain::receipt::ReceiptView;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutState {
    #[default]
    MethodSelection,
    Validating,
    Initiating,
    AwaitingConfirmation,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl CheckoutState {
    /// States from which `retry` may start a fresh attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutState::Failed | CheckoutState::TimedOut | CheckoutState::Cancelled
        )
    }

    /// States in which an attempt is underway.
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            CheckoutState::Validating
                | CheckoutState::Initiating
                | CheckoutState::AwaitingConfirmation
                | CheckoutState::Polling
        )
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CheckoutState::MethodSelection => "selecting a method",
            CheckoutState::Validating => "validating",
            CheckoutState::Initiating => "initiating",
            CheckoutState::AwaitingConfirmation => "awaiting confirmation",
            CheckoutState::Polling => "polling",
            CheckoutState::Succeeded => "succeeded",
            CheckoutState::Failed => "failed",
            CheckoutState::TimedOut => "timed out",
            CheckoutState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Category of a payer-facing error, serialized as its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Validation,
    Network,
    Timeout,
    Error,
}

/// Error shown to the payer. Every failure path ends in one of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckoutError {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl CheckoutError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            title: "Check your details".to_string(),
            message: message.into(),
            kind: ErrorKind::Validation,
        }
    }

    /// The gateway could not be reached while starting a charge. Reported
    /// as an `error`-kind failure, like a rejection, so retry is offered.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            title: "Connection problem".to_string(),
            message: message.into(),
            kind: ErrorKind::Error,
        }
    }

    pub fn declined(message: impl Into<String>) -> Self {
        Self {
            title: "Payment failed".to_string(),
            message: message.into(),
            kind: ErrorKind::Error,
        }
    }

    pub fn timed_out() -> Self {
        Self {
            title: "Payment request timed out".to_string(),
            message: "We did not receive a confirmation in time. If you entered your PIN, \
                      check your statement before paying again."
                .to_string(),
            kind: ErrorKind::Timeout,
        }
    }

    pub fn status_unknown(reference: &str) -> Self {
        Self {
            title: "Payment status unknown".to_string(),
            message: format!(
                "We could not confirm this payment. Contact support quoting reference \
                 {reference} before trying again."
            ),
            kind: ErrorKind::Error,
        }
    }
}

impl fmt::Display for CheckoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Snapshot published on every state change.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutView {
    pub state: CheckoutState,
    pub method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,
    /// Seconds left to confirm on the handset, only while awaiting confirmation.
    pub countdown: Option<u32>,
    pub error: Option<CheckoutError>,
    pub receipt: Option<ReceiptView>,
}

/// How one call to `submit_payment` ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    Completed(Payment),
    /// Rejected before any gateway call.
    Rejected(CheckoutError),
    Failed(CheckoutError),
    TimedOut(CheckoutError),
    /// Cancelled or superseded; the result, if any, was discarded.
    Abandoned,
}

impl CheckoutOutcome {
    pub fn error(&self) -> Option<&CheckoutError> {
        match self {
            CheckoutOutcome::Rejected(e)
            | CheckoutOutcome::Failed(e)
            | CheckoutOutcome::TimedOut(e) => Some(e),
            CheckoutOutcome::Completed(_) | CheckoutOutcome::Abandoned => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_with_type_field() {
        let json = serde_json::to_value(CheckoutError::timed_out()).unwrap();
        assert_eq!(json["type"], "timeout");
        assert_eq!(json["title"], "Payment request timed out");
    }

    #[test]
    fn test_retryable_states() {
        assert!(CheckoutState::Failed.is_retryable());
        assert!(CheckoutState::TimedOut.is_retryable());
        assert!(!CheckoutState::Succeeded.is_retryable());
        assert!(!CheckoutState::Polling.is_retryable());
        assert!(CheckoutState::Polling.is_in_flight());
    }
}
