use crate::domain::phone::PhoneNumber;
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Days, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

/// Represents a positive monetary amount to be charged.
///
/// Wraps `rust_decimal::Decimal` so that a zero or negative charge can never
/// reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(PaymentError::ValidationError(
                "Amount must be greater than zero".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

pub(crate) fn amount_too_large() -> PaymentError {
    PaymentError::ValidationError("Amount too large".to_string())
}

impl TryFrom<Decimal> for Amount {
    type Error = PaymentError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

/// Mobile-money networks that support push (STK) payment requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileProvider {
    Mpesa,
    Airtel,
    Telkom,
}

impl MobileProvider {
    pub fn display_name(&self) -> &'static str {
        match self {
            MobileProvider::Mpesa => "M-Pesa",
            MobileProvider::Airtel => "Airtel Money",
            MobileProvider::Telkom => "T-Kash",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Mpesa,
    Airtel,
    Telkom,
    Card,
}

impl PaymentMethod {
    pub fn display_name(&self) -> &'static str {
        match self.provider() {
            Some(provider) => provider.display_name(),
            None => "Credit/Debit Card",
        }
    }

    pub fn provider(&self) -> Option<MobileProvider> {
        match self {
            PaymentMethod::Mpesa => Some(MobileProvider::Mpesa),
            PaymentMethod::Airtel => Some(MobileProvider::Airtel),
            PaymentMethod::Telkom => Some(MobileProvider::Telkom),
            PaymentMethod::Card => None,
        }
    }

    pub fn is_mobile_money(&self) -> bool {
        self.provider().is_some()
    }
}

impl From<MobileProvider> for PaymentMethod {
    fn from(provider: MobileProvider) -> Self {
        match provider {
            MobileProvider::Mpesa => PaymentMethod::Mpesa,
            MobileProvider::Airtel => PaymentMethod::Airtel,
            MobileProvider::Telkom => PaymentMethod::Telkom,
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Opaque token produced by the card details form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardToken(String);

impl CardToken {
    pub fn parse(raw: &str) -> Result<Self> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(PaymentError::ValidationError(
                "Please enter your card details".to_string(),
            ));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shows at most the last four characters, and never more than half
    /// of the token.
    pub fn masked(&self) -> String {
        let len = self.0.chars().count();
        let visible = (len / 2).min(4);
        let start = self
            .0
            .char_indices()
            .nth(len - visible)
            .map_or(self.0.len(), |(i, _)| i);
        format!("****{}", &self.0[start..])
    }
}

/// What the payer picked in the method selection step, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInput {
    MobileMoney {
        provider: MobileProvider,
        phone: String,
    },
    Card {
        card_token: String,
    },
}

impl PaymentInput {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentInput::MobileMoney { provider, .. } => (*provider).into(),
            PaymentInput::Card { .. } => PaymentMethod::Card,
        }
    }

    /// Validates the selection into the instrument that will be charged.
    pub fn validate(&self) -> Result<Instrument> {
        match self {
            PaymentInput::MobileMoney { provider, phone } => Ok(Instrument::MobileMoney {
                provider: *provider,
                phone: PhoneNumber::parse(phone)?,
            }),
            PaymentInput::Card { card_token } => Ok(Instrument::Card {
                token: CardToken::parse(card_token)?,
            }),
        }
    }
}

/// A validated means of payment. Exactly one of phone or card token exists,
/// and it always matches the method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instrument {
    MobileMoney {
        provider: MobileProvider,
        phone: PhoneNumber,
    },
    Card {
        token: CardToken,
    },
}

impl Instrument {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Instrument::MobileMoney { provider, .. } => (*provider).into(),
            Instrument::Card { .. } => PaymentMethod::Card,
        }
    }

    pub fn masked(&self) -> String {
        match self {
            Instrument::MobileMoney { phone, .. } => phone.masked(),
            Instrument::Card { token } => token.masked(),
        }
    }
}

/// Per-attempt reference sent to the gateway, `RENT-{property}-{epochMillis}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountReference(String);

impl AccountReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues account references whose timestamps strictly increase, so two
/// attempts started within the same millisecond still get distinct values.
#[derive(Debug, Default)]
pub struct ReferenceGenerator {
    last_millis: AtomicI64,
}

impl ReferenceGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self, property_id: &str, now: DateTime<Utc>) -> AccountReference {
        let now_millis = now.timestamp_millis();
        let mut last = self.last_millis.load(Ordering::Relaxed);
        let millis = loop {
            let candidate = now_millis.max(last + 1);
            match self.last_millis.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => break candidate,
                Err(actual) => last = actual,
            }
        };
        AccountReference(format!("RENT-{property_id}-{millis}"))
    }
}

/// The rent line the payer is settling.
#[derive(Debug, Clone, PartialEq)]
pub struct RentCharge {
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub property_id: String,
}

impl RentCharge {
    pub fn new(amount: Decimal, due_date: NaiveDate, property_id: impl Into<String>) -> Self {
        Self {
            amount,
            due_date,
            property_id: property_id.into(),
        }
    }
}

/// Percentage surcharge applied to rent paid after the due date plus grace.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LateFeePolicy {
    pub percent: Option<Decimal>,
    pub grace_days: u32,
}

impl LateFeePolicy {
    /// Fee owed on `rent` when paid on `paid_on`, or `None` when on time.
    pub fn assess(
        &self,
        rent: Amount,
        due_date: NaiveDate,
        paid_on: NaiveDate,
    ) -> Result<Option<Decimal>> {
        let Some(percent) = self.percent.filter(|p| *p > Decimal::ZERO) else {
            return Ok(None);
        };
        let deadline = due_date
            .checked_add_days(Days::new(u64::from(self.grace_days)))
            .unwrap_or(due_date);
        if paid_on <= deadline {
            return Ok(None);
        }
        let fee = rent
            .value()
            .checked_mul(percent)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .ok_or_else(amount_too_large)?
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        Ok((fee > Decimal::ZERO).then_some(fee))
    }
}

/// Everything needed to ask the gateway for one charge.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub amount: Amount,
    pub instrument: Instrument,
    pub account_reference: AccountReference,
    pub property_id: String,
    pub due_date: NaiveDate,
    pub late_fee: Option<Decimal>,
}

impl PaymentRequest {
    pub fn method(&self) -> PaymentMethod {
        self.instrument.method()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Timeout,
}

/// One gateway-accepted payment attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: String,
    pub request: PaymentRequest,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(id: impl Into<String>, request: PaymentRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            request,
            status: TransactionStatus::Pending,
            created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Completed,
}

/// A settled payment, handed to the success callback and the receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub transaction_id: String,
    /// Total charged, late fee included.
    pub amount: Decimal,
    pub late_fee: Option<Decimal>,
    pub payment_date: DateTime<Utc>,
    pub method: PaymentMethod,
    pub transaction_reference: String,
    pub property_id: String,
    pub due_date: NaiveDate,
    pub status: PaymentStatus,
}

impl Payment {
    pub fn completed(transaction: &Transaction, paid_at: DateTime<Utc>) -> Self {
        let request = &transaction.request;
        Self {
            transaction_id: transaction.id.clone(),
            amount: request.amount.value(),
            late_fee: request.late_fee,
            payment_date: paid_at,
            method: request.method(),
            transaction_reference: request.account_reference.to_string(),
            property_id: request.property_id.clone(),
            due_date: request.due_date,
            status: PaymentStatus::Completed,
        }
    }
}
