use crate::config::GatewayConfig;
use crate::domain::payment::{AccountReference, Amount, CardToken, MobileProvider};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{Initiation, PaymentGateway, StatusReport};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MobileMoneyBody<'a> {
    phone_number: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    account_reference: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CardBody<'a> {
    card_token: &'a str,
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    account_reference: &'a str,
}

fn provider_segment(provider: MobileProvider) -> &'static str {
    match provider {
        MobileProvider::Mpesa => "mpesa",
        MobileProvider::Airtel => "airtel",
        MobileProvider::Telkom => "telkom",
    }
}

/// Payment gateway reached through the portal's backend REST API.
#[derive(Clone)]
pub struct HttpGateway {
    config: Arc<GatewayConfig>,
    base_url: Url,
    http_client: Client,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Transport(format!("invalid gateway url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Transport(format!(
                "gateway url cannot be a base: {}",
                config.base_url
            )));
        }
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            base_url,
            http_client,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T, GatewayError> {
        let request = self.http_client.post(self.endpoint(segments)).json(body);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, GatewayError> {
        let request = self.http_client.get(self.endpoint(segments));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let status = response.status();

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()))
        } else {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            Err(GatewayError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn initiate_mobile_money(
        &self,
        provider: MobileProvider,
        phone: &PhoneNumber,
        amount: Amount,
        reference: &AccountReference,
    ) -> Result<Initiation, GatewayError> {
        let body = MobileMoneyBody {
            phone_number: phone.as_str(),
            amount: amount.value(),
            account_reference: reference.as_str(),
        };
        self.post(&["payments", provider_segment(provider), "initiate"], &body)
            .await
    }

    async fn process_card_payment(
        &self,
        card_token: &CardToken,
        amount: Amount,
        reference: &AccountReference,
    ) -> Result<Initiation, GatewayError> {
        let body = CardBody {
            card_token: card_token.as_str(),
            amount: amount.value(),
            account_reference: reference.as_str(),
        };
        self.post(&["payments", "card"], &body).await
    }

    async fn check_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<StatusReport, GatewayError> {
        self.get(&["payments", transaction_id, "status"]).await
    }
}
