use crate::domain::payment::{AccountReference, Amount, CardToken, MobileProvider, PaymentMethod};
use crate::domain::phone::PhoneNumber;
use crate::domain::ports::{GatewayStatus, Initiation, PaymentGateway, StatusReport};
use crate::error::GatewayError;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, Notify};

/// A charge request as the gateway received it.
#[derive(Debug, Clone, PartialEq)]
pub struct InitiationCall {
    pub method: PaymentMethod,
    pub amount: Amount,
    pub account_reference: AccountReference,
    /// Normalized phone number, or the card token.
    pub destination: String,
}

#[derive(Debug, Clone)]
enum InitiationStep {
    Reply(Initiation),
    TransportFailure(String),
    /// Waits for the gate before answering.
    Held(Arc<Notify>, Initiation),
}

#[derive(Debug, Clone)]
enum StatusStep {
    Reply(StatusReport),
    TransportFailure(String),
    /// Waits for the gate before answering.
    Held(Arc<Notify>, StatusReport),
}

#[derive(Debug)]
struct Script {
    initiations: VecDeque<InitiationStep>,
    statuses: VecDeque<StatusStep>,
    fallback_status: StatusReport,
    calls: Vec<InitiationCall>,
    checked_ids: Vec<String>,
}

/// In-process gateway that plays back scripted replies and records calls.
///
/// Initiations accept with `TX-{n}` ids unless a reply is queued; status
/// checks answer `pending` once the queue is exhausted unless another
/// fallback is set.
#[derive(Debug)]
pub struct ScriptedGateway {
    script: Mutex<Script>,
    issued: AtomicUsize,
    status_checks: AtomicUsize,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                initiations: VecDeque::new(),
                statuses: VecDeque::new(),
                fallback_status: StatusReport::new(GatewayStatus::Pending, "Awaiting confirmation"),
                calls: Vec::new(),
                checked_ids: Vec::new(),
            }),
            issued: AtomicUsize::new(0),
            status_checks: AtomicUsize::new(0),
        }
    }

    /// Confirms the payment on the `pending_polls + 1`-th status check.
    pub fn succeeding_after(pending_polls: usize) -> Self {
        Self::new()
            .with_statuses(std::iter::repeat_n(GatewayStatus::Pending, pending_polls))
            .with_status(StatusReport::new(GatewayStatus::Success, "Payment confirmed"))
    }

    /// Reports a declined payment on the `pending_polls + 1`-th status check.
    pub fn declining_after(pending_polls: usize) -> Self {
        Self::new()
            .with_statuses(std::iter::repeat_n(GatewayStatus::Pending, pending_polls))
            .with_status(StatusReport::new(
                GatewayStatus::Failed,
                "Request cancelled by user",
            ))
    }

    pub fn with_initiation(mut self, reply: Initiation) -> Self {
        self.script
            .get_mut()
            .initiations
            .push_back(InitiationStep::Reply(reply));
        self
    }

    pub fn with_initiation_failure(mut self, reason: impl Into<String>) -> Self {
        self.script
            .get_mut()
            .initiations
            .push_back(InitiationStep::TransportFailure(reason.into()));
        self
    }

    /// Queues an initiation reply that is only delivered once `gate` is
    /// notified.
    pub fn with_held_initiation(mut self, gate: Arc<Notify>, reply: Initiation) -> Self {
        self.script
            .get_mut()
            .initiations
            .push_back(InitiationStep::Held(gate, reply));
        self
    }

    pub fn with_status(mut self, report: StatusReport) -> Self {
        self.script
            .get_mut()
            .statuses
            .push_back(StatusStep::Reply(report));
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = GatewayStatus>) -> Self {
        let script = self.script.get_mut();
        for status in statuses {
            script
                .statuses
                .push_back(StatusStep::Reply(StatusReport::new(status, "")));
        }
        self
    }

    pub fn with_status_failure(mut self, reason: impl Into<String>) -> Self {
        self.script
            .get_mut()
            .statuses
            .push_back(StatusStep::TransportFailure(reason.into()));
        self
    }

    /// Queues a status reply that is only delivered once `gate` is notified.
    pub fn with_held_status(mut self, gate: Arc<Notify>, report: StatusReport) -> Self {
        self.script
            .get_mut()
            .statuses
            .push_back(StatusStep::Held(gate, report));
        self
    }

    pub fn with_fallback_status(mut self, report: StatusReport) -> Self {
        self.script.get_mut().fallback_status = report;
        self
    }

    pub async fn initiations(&self) -> Vec<InitiationCall> {
        self.script.lock().await.calls.clone()
    }

    pub async fn checked_ids(&self) -> Vec<String> {
        self.script.lock().await.checked_ids.clone()
    }

    pub fn status_check_count(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    async fn record_initiation(&self, call: InitiationCall) -> Result<Initiation, GatewayError> {
        let step = {
            let mut script = self.script.lock().await;
            script.calls.push(call);
            script.initiations.pop_front()
        };

        match step {
            Some(InitiationStep::Reply(reply)) => Ok(reply),
            Some(InitiationStep::TransportFailure(reason)) => Err(GatewayError::Transport(reason)),
            Some(InitiationStep::Held(gate, reply)) => {
                gate.notified().await;
                Ok(reply)
            }
            None => {
                let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Initiation::accepted(
                    format!("TX-{n}"),
                    "Request accepted for processing",
                ))
            }
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn initiate_mobile_money(
        &self,
        provider: MobileProvider,
        phone: &PhoneNumber,
        amount: Amount,
        reference: &AccountReference,
    ) -> Result<Initiation, GatewayError> {
        self.record_initiation(InitiationCall {
            method: provider.into(),
            amount,
            account_reference: reference.clone(),
            destination: phone.as_str().to_string(),
        })
        .await
    }

    async fn process_card_payment(
        &self,
        card_token: &CardToken,
        amount: Amount,
        reference: &AccountReference,
    ) -> Result<Initiation, GatewayError> {
        self.record_initiation(InitiationCall {
            method: PaymentMethod::Card,
            amount,
            account_reference: reference.clone(),
            destination: card_token.as_str().to_string(),
        })
        .await
    }

    async fn check_payment_status(
        &self,
        transaction_id: &str,
    ) -> Result<StatusReport, GatewayError> {
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.script.lock().await;
            script.checked_ids.push(transaction_id.to_string());
            script
                .statuses
                .pop_front()
                .unwrap_or_else(|| StatusStep::Reply(script.fallback_status.clone()))
        };

        match step {
            StatusStep::Reply(report) => Ok(report),
            StatusStep::TransportFailure(reason) => Err(GatewayError::Transport(reason)),
            StatusStep::Held(gate, report) => {
                gate.notified().await;
                Ok(report)
            }
        }
    }
}
