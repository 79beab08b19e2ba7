//! Application layer containing the payment flow orchestration.
//!
//! `PaymentOrchestrator` is the entry point: it validates the payer's input,
//! asks the gateway to initiate the charge through `PaymentGatewayClient`, and
//! for mobile money waits on `PaymentStatusPoller` for the handset
//! confirmation. All gateway calls are async and cancellable.

pub mod gateway_client;
pub mod orchestrator;
pub mod poller;
