use super::payment::{AccountReference, Amount, CardToken, MobileProvider, Payment};
use super::phone::PhoneNumber;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Gateway reply to a charge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Initiation {
    pub success: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl Initiation {
    pub fn accepted(transaction_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Pending,
    #[serde(alias = "completed")]
    Success,
    Failed,
}

/// Gateway reply to a status check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: GatewayStatus,
    #[serde(default)]
    pub message: String,
}

impl StatusReport {
    pub fn new(status: GatewayStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// The backend payment API. `Err` means the gateway could not be asked;
/// a definitive "no" comes back as `Ok` with `success == false` or
/// `GatewayStatus::Failed`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initiate_mobile_money(
        &self,
        provider: MobileProvider,
        phone: &PhoneNumber,
        amount: Amount,
        reference: &AccountReference,
    ) -> Result<Initiation, GatewayError>;

    async fn process_card_payment(
        &self,
        card_token: &CardToken,
        amount: Amount,
        reference: &AccountReference,
    ) -> Result<Initiation, GatewayError>;

    /// Must be idempotent and free of gateway-side effects.
    async fn check_payment_status(&self, transaction_id: &str)
    -> Result<StatusReport, GatewayError>;
}

pub type GatewayBox = Arc<dyn PaymentGateway>;

/// Callbacks into the page that opened the checkout.
pub trait CheckoutListener: Send + Sync {
    /// Fires at most once per checkout.
    fn on_success(&self, payment: &Payment);

    fn on_cancel(&self) {}
}

pub type ListenerBox = Arc<dyn CheckoutListener>;
