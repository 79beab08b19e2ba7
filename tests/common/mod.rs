#![allow(dead_code)]

use chrono::NaiveDate;
use rentpay::domain::payment::{MobileProvider, Payment, PaymentInput, RentCharge};
use rentpay::domain::ports::CheckoutListener;
use rust_decimal_macros::dec;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Records every callback the orchestrator makes.
#[derive(Default)]
pub struct RecordingListener {
    payments: Mutex<Vec<Payment>>,
    cancels: AtomicUsize,
}

impl RecordingListener {
    pub fn payments(&self) -> Vec<Payment> {
        self.payments.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl CheckoutListener for RecordingListener {
    fn on_success(&self, payment: &Payment) {
        self.payments.lock().unwrap().push(payment.clone());
    }

    fn on_cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn rent_charge() -> RentCharge {
    RentCharge::new(dec!(50000), NaiveDate::from_ymd_opt(2099, 1, 1).unwrap(), "P1")
}

pub fn mpesa(phone: &str) -> PaymentInput {
    PaymentInput::MobileMoney {
        provider: MobileProvider::Mpesa,
        phone: phone.to_string(),
    }
}

pub fn card(token: &str) -> PaymentInput {
    PaymentInput::Card {
        card_token: token.to_string(),
    }
}
