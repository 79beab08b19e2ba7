//! Output adapters for completed payments.

pub mod csv;
