use chrono::{TimeZone, Utc};
use rentpay::application::orchestrator::PaymentOrchestrator;
use rentpay::config::GatewayConfig;
use rentpay::domain::checkout::{CheckoutOutcome, CheckoutState};
use rentpay::domain::payment::{
    AccountReference, Amount, CardToken, MobileProvider, PaymentInput, ReferenceGenerator,
};
use rentpay::domain::phone::PhoneNumber;
use rentpay::domain::ports::{GatewayStatus, PaymentGateway};
use rentpay::error::GatewayError;
use rentpay::infrastructure::http::HttpGateway;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{RecordingListener, rent_charge};

fn gateway_for(server: &MockServer, api_token: Option<&str>) -> HttpGateway {
    HttpGateway::new(GatewayConfig {
        base_url: format!("{}/api", server.uri()),
        api_token: api_token.map(str::to_string),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn first_reference() -> AccountReference {
    ReferenceGenerator::new().next("P1", Utc.timestamp_millis_opt(1).unwrap())
}

#[tokio::test]
async fn test_mobile_money_initiation_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/mpesa/initiate"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({
            "phoneNumber": "254712345678",
            "amount": 50000.0,
            "accountReference": "RENT-P1-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transactionId": "ws_CO_1",
            "message": "Success. Request accepted for processing"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, Some("secret-token"));
    let initiation = gateway
        .initiate_mobile_money(
            MobileProvider::Mpesa,
            &PhoneNumber::parse("0712 345 678").unwrap(),
            Amount::new(dec!(50000)).unwrap(),
            &first_reference(),
        )
        .await
        .unwrap();

    assert!(initiation.success);
    assert_eq!(initiation.transaction_id.as_deref(), Some("ws_CO_1"));
}

#[tokio::test]
async fn test_card_payment_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/card"))
        .and(body_json(json!({
            "cardToken": "tok_visa_4242",
            "amount": 1250.5,
            "accountReference": "RENT-P1-1"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "Card declined"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = gateway_for(&server, None);
    let initiation = gateway
        .process_card_payment(
            &CardToken::parse("tok_visa_4242").unwrap(),
            Amount::new(dec!(1250.50)).unwrap(),
            &first_reference(),
        )
        .await
        .unwrap();

    assert!(!initiation.success);
    assert_eq!(initiation.transaction_id, None);
    assert_eq!(initiation.message, "Card declined");
}

#[tokio::test]
async fn test_status_check_accepts_completed_alias() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payments/ws_CO_1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "completed",
            "message": "The service request is processed successfully."
        })))
        .mount(&server)
        .await;

    let report = gateway_for(&server, None)
        .check_payment_status("ws_CO_1")
        .await
        .unwrap();

    assert_eq!(report.status, GatewayStatus::Success);
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payments/ws_CO_1/status"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let result = gateway_for(&server, None)
        .check_payment_status("ws_CO_1")
        .await;

    match result {
        Err(GatewayError::Api { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "upstream unavailable");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/payments/ws_CO_1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let result = gateway_for(&server, None)
        .check_payment_status("ws_CO_1")
        .await;

    assert!(matches!(result, Err(GatewayError::Decode(_))));
}

#[tokio::test]
async fn test_unreachable_gateway_is_transport_error() {
    let gateway = HttpGateway::new(GatewayConfig {
        base_url: "http://127.0.0.1:1/api".to_string(),
        api_token: None,
        timeout: Duration::from_secs(2),
    })
    .unwrap();

    let result = gateway.check_payment_status("ws_CO_1").await;
    assert!(matches!(result, Err(GatewayError::Transport(_))));
}

#[tokio::test]
async fn test_checkout_over_http_completes_after_pending_polls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/payments/airtel/initiate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "transactionId": "AIR-77",
            "message": "Request sent to handset"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/payments/AIR-77/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/payments/AIR-77/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "message": "Payment confirmed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listener = Arc::new(RecordingListener::default());
    let orch = PaymentOrchestrator::new(Arc::new(gateway_for(&server, None)), listener.clone())
        .with_confirmation_window(Duration::ZERO)
        .with_polling(10, Duration::from_millis(10));

    orch.select_method(PaymentInput::MobileMoney {
        provider: MobileProvider::Airtel,
        phone: "0733123456".to_string(),
    })
    .await
    .unwrap();
    let outcome = orch.submit_payment(rent_charge()).await.unwrap();

    assert!(matches!(outcome, CheckoutOutcome::Completed(ref p) if p.transaction_id == "AIR-77"));
    assert_eq!(orch.view().state, CheckoutState::Succeeded);
    assert_eq!(listener.payments().len(), 1);
}
