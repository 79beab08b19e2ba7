use super::payment::Payment;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::fmt;

pub const RECEIPT_DISCLAIMER: &str = "This is a computer-generated receipt and does not require a \
     signature. Keep it for your records and quote the reference in any query.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub label: String,
    pub amount: String,
}

/// A completed payment laid out for display or export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptView {
    pub transaction_id: String,
    pub transaction_reference: String,
    pub property_id: String,
    pub date: String,
    pub time: String,
    pub due_date: String,
    pub method: String,
    pub items: Vec<ReceiptLine>,
    pub total: String,
    pub status: String,
    pub disclaimer: String,
}

/// Pure `Payment -> ReceiptView` transform.
#[derive(Debug, Clone)]
pub struct ReceiptFormatter {
    currency: String,
}

impl Default for ReceiptFormatter {
    fn default() -> Self {
        Self::new("KES")
    }
}

impl ReceiptFormatter {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn format(&self, payment: &Payment) -> ReceiptView {
        let late_fee = payment.late_fee.unwrap_or(Decimal::ZERO);
        let mut items = vec![ReceiptLine {
            label: "Rent".to_string(),
            amount: self.money(payment.amount - late_fee),
        }];
        if late_fee > Decimal::ZERO {
            items.push(ReceiptLine {
                label: "Late fee".to_string(),
                amount: self.money(late_fee),
            });
        }

        ReceiptView {
            transaction_id: payment.transaction_id.clone(),
            transaction_reference: payment.transaction_reference.clone(),
            property_id: payment.property_id.clone(),
            date: payment.payment_date.format("%B %-d, %Y").to_string(),
            time: payment.payment_date.format("%-I:%M %p UTC").to_string(),
            due_date: payment.due_date.format("%B %-d, %Y").to_string(),
            method: payment.method.display_name().to_string(),
            items,
            total: self.money(payment.amount),
            status: "Completed".to_string(),
            disclaimer: RECEIPT_DISCLAIMER.to_string(),
        }
    }

    fn money(&self, value: Decimal) -> String {
        format!("{} {}", self.currency, group_thousands(value))
    }
}

/// `1234567.5` -> `1,234,567.50`
fn group_thousands(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.2}", rounded.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped}.{fraction}")
}

impl fmt::Display for ReceiptView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PAYMENT RECEIPT")?;
        writeln!(f, "Transaction ID: {}", self.transaction_id)?;
        writeln!(f, "Reference:      {}", self.transaction_reference)?;
        writeln!(f, "Property:       {}", self.property_id)?;
        writeln!(f, "Date:           {} {}", self.date, self.time)?;
        writeln!(f, "Due date:       {}", self.due_date)?;
        writeln!(f, "Method:         {}", self.method)?;
        writeln!(f, "Status:         {}", self.status)?;
        writeln!(f)?;
        for line in &self.items {
            writeln!(f, "{:<16}{:>20}", line.label, line.amount)?;
        }
        writeln!(f, "{:<16}{:>20}", "Total", self.total)?;
        writeln!(f)?;
        write!(f, "{}", self.disclaimer)
    }
}
