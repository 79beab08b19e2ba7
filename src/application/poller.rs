use super::gateway_client::PaymentGatewayClient;
use crate::domain::ports::GatewayStatus;
use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Success,
    Failed,
    Timeout,
}

/// Terminal result of one polling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollResult {
    pub status: PollStatus,
    pub message: String,
}

impl PollResult {
    fn timed_out() -> Self {
        Self {
            status: PollStatus::Timeout,
            message: "Payment request timed out".to_string(),
        }
    }
}

/// Asks the gateway for a transaction's status until it settles, the
/// attempt ceiling is reached, or the caller cancels.
///
/// Worst-case wall time is bounded by `max_attempts * interval`; waits
/// between attempts are suspensions, not blocking sleeps.
#[derive(Clone)]
pub struct PaymentStatusPoller {
    client: PaymentGatewayClient,
    max_attempts: u32,
    interval: Duration,
}

impl PaymentStatusPoller {
    pub fn new(client: PaymentGatewayClient) -> Self {
        Self {
            client,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Polls until `Success`, `Failed`, or `Timeout`.
    ///
    /// Returns `PaymentError::Cancelled` if `cancel` fires before a terminal
    /// answer; no further status checks are issued after that. A status
    /// check that cannot reach the gateway aborts polling with
    /// `PaymentError::GatewayError`; it is not retried.
    pub async fn poll(
        &self,
        transaction_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PollResult> {
        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                debug!(transaction_id, attempt, "Polling cancelled");
                return Err(PaymentError::Cancelled);
            }

            let report = self.client.check_status(transaction_id).await.map_err(|e| {
                error!(transaction_id, attempt, error = %e, "Status check failed, aborting poll");
                PaymentError::from(e)
            })?;

            match report.status {
                GatewayStatus::Success => {
                    info!(transaction_id, attempt, "Payment confirmed");
                    return Ok(PollResult {
                        status: PollStatus::Success,
                        message: report.message,
                    });
                }
                GatewayStatus::Failed => {
                    warn!(transaction_id, attempt, message = %report.message, "Payment failed");
                    return Ok(PollResult {
                        status: PollStatus::Failed,
                        message: report.message,
                    });
                }
                GatewayStatus::Pending => {
                    debug!(transaction_id, attempt, "Payment still pending");
                }
            }

            if attempt < self.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(transaction_id, attempt, "Polling cancelled");
                        return Err(PaymentError::Cancelled);
                    }
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }
        }

        warn!(
            transaction_id,
            attempts = self.max_attempts,
            "Payment still pending after final attempt"
        );
        Ok(PollResult::timed_out())
    }
}
