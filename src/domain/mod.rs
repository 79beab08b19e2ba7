//! Domain layer: payment types, phone rules, receipts, and the ports the
//! application layer drives.

pub mod checkout;
pub mod payment;
pub mod phone;
pub mod ports;
pub mod receipt;
