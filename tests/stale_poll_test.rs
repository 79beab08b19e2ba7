use rentpay::application::orchestrator::PaymentOrchestrator;
use rentpay::domain::checkout::{CheckoutOutcome, CheckoutState};
use rentpay::domain::payment::PaymentInput;
use rentpay::domain::ports::{GatewayStatus, Initiation, StatusReport};
use rentpay::infrastructure::scripted::ScriptedGateway;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

mod common;
use common::{RecordingListener, card, mpesa, rent_charge};

#[tokio::test(start_paused = true)]
async fn test_late_result_from_cancelled_attempt_is_ignored() {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(ScriptedGateway::new().with_held_status(
        gate.clone(),
        StatusReport::new(GatewayStatus::Success, "Payment confirmed"),
    ));
    let listener = Arc::new(RecordingListener::default());
    let orch = Arc::new(
        PaymentOrchestrator::new(gateway.clone(), listener.clone())
            .with_confirmation_window(Duration::ZERO)
            .with_polling(600, Duration::from_secs(1)),
    );
    orch.select_method(mpesa("0712345678")).await.unwrap();

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_payment(rent_charge()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(orch.view().state, CheckoutState::Polling);
    assert_eq!(gateway.status_check_count(), 1);

    // First attempt is stuck inside its status check while the user moves on.
    orch.cancel().await;
    assert_eq!(orch.view().state, CheckoutState::Cancelled);
    orch.retry().await.unwrap();

    let second = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_payment(rent_charge()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    let view = orch.view();
    assert_eq!(view.state, CheckoutState::Polling);
    assert_eq!(view.transaction_id.as_deref(), Some("TX-2"));

    gate.notify_one();
    let stale = first.await.unwrap().unwrap();
    assert!(matches!(stale, CheckoutOutcome::Abandoned));

    let view = orch.view();
    assert_eq!(view.state, CheckoutState::Polling);
    assert_eq!(view.transaction_id.as_deref(), Some("TX-2"));
    assert!(view.receipt.is_none());
    assert!(listener.payments().is_empty());

    orch.cancel().await;
    let current = second.await.unwrap().unwrap();
    assert!(matches!(current, CheckoutOutcome::Abandoned));
    assert!(listener.payments().is_empty());
    assert_eq!(listener.cancels(), 2);

    let checked = gateway.checked_ids().await;
    assert_eq!(checked.first().map(String::as_str), Some("TX-1"));
    assert!(checked[1..].iter().all(|id| id == "TX-2"));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_confirmation_window_stops_polling() {
    let gateway = Arc::new(ScriptedGateway::new());
    let listener = Arc::new(RecordingListener::default());
    let orch = Arc::new(
        PaymentOrchestrator::new(gateway.clone(), listener.clone())
            .with_confirmation_window(Duration::from_secs(30))
            .with_polling(60, Duration::from_secs(1)),
    );
    orch.select_method(mpesa("0712345678")).await.unwrap();

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_payment(rent_charge()).await })
    };
    tokio::time::sleep(Duration::from_millis(2500)).await;
    let view = orch.view();
    assert_eq!(view.state, CheckoutState::AwaitingConfirmation);
    assert_eq!(view.countdown, Some(28));

    orch.cancel().await;
    let outcome = task.await.unwrap().unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Abandoned));

    let checks = gateway.status_check_count();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(gateway.status_check_count(), checks);

    let view = orch.view();
    assert_eq!(view.state, CheckoutState::Cancelled);
    assert_eq!(view.countdown, None);
    assert_eq!(view.transaction_id, None);
    assert!(orch.transaction().await.is_none());
    assert_eq!(listener.cancels(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_then_retry_starts_clean_attempt() {
    let gateway = Arc::new(ScriptedGateway::new());
    let listener = Arc::new(RecordingListener::default());
    let orch = Arc::new(
        PaymentOrchestrator::new(gateway.clone(), listener.clone())
            .with_confirmation_window(Duration::ZERO)
            .with_polling(60, Duration::from_secs(1)),
    );
    orch.select_method(mpesa("0712345678")).await.unwrap();

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_payment(rent_charge()).await })
    };
    tokio::time::sleep(Duration::from_millis(1500)).await;
    orch.cancel().await;
    task.await.unwrap().unwrap();

    orch.retry().await.unwrap();
    let view = orch.view();
    assert_eq!(view.state, CheckoutState::MethodSelection);
    assert_eq!(view.error, None);
    assert_eq!(view.transaction_id, None);
}

async fn cancel_while_initiating(input: PaymentInput) {
    let gate = Arc::new(Notify::new());
    let gateway = Arc::new(
        ScriptedGateway::new()
            .with_held_initiation(gate.clone(), Initiation::accepted("H1", "Accepted"))
            .with_fallback_status(StatusReport::new(GatewayStatus::Success, "Confirmed")),
    );
    let listener = Arc::new(RecordingListener::default());
    let orch = Arc::new(
        PaymentOrchestrator::new(gateway.clone(), listener.clone())
            .with_confirmation_window(Duration::ZERO)
            .with_polling(60, Duration::from_secs(1)),
    );
    orch.select_method(input).await.unwrap();

    let task = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.submit_payment(rent_charge()).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(orch.view().state, CheckoutState::Initiating);
    assert_eq!(gateway.initiations().await.len(), 1);

    orch.cancel().await;
    let outcome = task.await.unwrap().unwrap();
    assert!(matches!(outcome, CheckoutOutcome::Abandoned));

    // The gateway answering afterwards changes nothing.
    gate.notify_one();
    tokio::time::sleep(Duration::from_secs(5)).await;

    let view = orch.view();
    assert_eq!(view.state, CheckoutState::Cancelled);
    assert_eq!(view.transaction_id, None);
    assert!(listener.payments().is_empty());
    assert_eq!(listener.cancels(), 1);
    assert_eq!(gateway.status_check_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_card_payment_is_initiating() {
    cancel_while_initiating(card("tok_visa_4242")).await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_mobile_money_is_initiating() {
    cancel_while_initiating(mpesa("0712345678")).await;
}
