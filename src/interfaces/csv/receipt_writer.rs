use crate::domain::receipt::ReceiptView;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ReceiptRow<'a> {
    transaction_id: &'a str,
    reference: &'a str,
    property: &'a str,
    date: &'a str,
    time: &'a str,
    due_date: &'a str,
    method: &'a str,
    rent: &'a str,
    late_fee: &'a str,
    total: &'a str,
    status: &'a str,
}

impl<'a> From<&'a ReceiptView> for ReceiptRow<'a> {
    fn from(receipt: &'a ReceiptView) -> Self {
        Self {
            transaction_id: &receipt.transaction_id,
            reference: &receipt.transaction_reference,
            property: &receipt.property_id,
            date: &receipt.date,
            time: &receipt.time,
            due_date: &receipt.due_date,
            method: &receipt.method,
            rent: line_amount(receipt, "Rent"),
            late_fee: line_amount(receipt, "Late fee"),
            total: &receipt.total,
            status: &receipt.status,
        }
    }
}

fn line_amount<'a>(receipt: &'a ReceiptView, label: &str) -> &'a str {
    receipt
        .items
        .iter()
        .find(|line| line.label == label)
        .map(|line| line.amount.as_str())
        .unwrap_or("")
}

/// Writes receipts as CSV, one row per payment, with a header row.
pub struct ReceiptWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReceiptWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_receipts<'a>(
        &mut self,
        receipts: impl IntoIterator<Item = &'a ReceiptView>,
    ) -> Result<()> {
        for receipt in receipts {
            self.writer.serialize(ReceiptRow::from(receipt))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
