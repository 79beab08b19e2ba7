use crate::domain::payment::{Instrument, PaymentRequest};
use crate::domain::ports::{GatewayBox, Initiation, StatusReport};
use crate::error::GatewayError;
use tracing::{debug, info};

/// Routes a payment request to the gateway call for its instrument.
///
/// Each mobile-money network and the card processor has its own initiation
/// endpoint; the match on [`Instrument`] keeps that routing exhaustive.
#[derive(Clone)]
pub struct PaymentGatewayClient {
    gateway: GatewayBox,
}

impl PaymentGatewayClient {
    pub fn new(gateway: GatewayBox) -> Self {
        Self { gateway }
    }

    pub async fn initiate(&self, request: &PaymentRequest) -> Result<Initiation, GatewayError> {
        info!(
            method = %request.method(),
            instrument = %request.instrument.masked(),
            amount = %request.amount.value(),
            account_reference = %request.account_reference,
            "Initiating payment"
        );

        let initiation = match &request.instrument {
            Instrument::MobileMoney { provider, phone } => {
                self.gateway
                    .initiate_mobile_money(
                        *provider,
                        phone,
                        request.amount,
                        &request.account_reference,
                    )
                    .await?
            }
            Instrument::Card { token } => {
                self.gateway
                    .process_card_payment(token, request.amount, &request.account_reference)
                    .await?
            }
        };

        info!(
            account_reference = %request.account_reference,
            success = initiation.success,
            transaction_id = initiation.transaction_id.as_deref().unwrap_or(""),
            "Gateway answered initiation"
        );
        Ok(initiation)
    }

    pub async fn check_status(&self, transaction_id: &str) -> Result<StatusReport, GatewayError> {
        let report = self.gateway.check_payment_status(transaction_id).await?;
        debug!(transaction_id, status = ?report.status, "Checked payment status");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{
        Amount, MobileProvider, PaymentInput, PaymentMethod, ReferenceGenerator,
    };
    use crate::infrastructure::scripted::ScriptedGateway;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn request(input: PaymentInput) -> PaymentRequest {
        PaymentRequest {
            amount: Amount::new(dec!(1500)).unwrap(),
            instrument: input.validate().unwrap(),
            account_reference: ReferenceGenerator::new().next("P9", Utc::now()),
            property_id: "P9".to_string(),
            due_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            late_fee: None,
        }
    }

    #[tokio::test]
    async fn test_dispatches_by_instrument() {
        let gateway = Arc::new(ScriptedGateway::new());
        let client = PaymentGatewayClient::new(gateway.clone());

        for provider in [
            MobileProvider::Mpesa,
            MobileProvider::Airtel,
            MobileProvider::Telkom,
        ] {
            client
                .initiate(&request(PaymentInput::MobileMoney {
                    provider,
                    phone: "0712345678".to_string(),
                }))
                .await
                .unwrap();
        }
        client
            .initiate(&request(PaymentInput::Card {
                card_token: "tok_1".to_string(),
            }))
            .await
            .unwrap();

        let methods: Vec<PaymentMethod> = gateway
            .initiations()
            .await
            .iter()
            .map(|call| call.method)
            .collect();
        assert_eq!(
            methods,
            vec![
                PaymentMethod::Mpesa,
                PaymentMethod::Airtel,
                PaymentMethod::Telkom,
                PaymentMethod::Card
            ]
        );
    }
}
