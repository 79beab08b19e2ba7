use super::gateway_client::PaymentGatewayClient;
use super::poller::{PaymentStatusPoller, PollStatus};
use crate::config::PortalConfig;
use crate::domain::checkout::{CheckoutError, CheckoutOutcome, CheckoutState, CheckoutView};
use crate::domain::payment::{
    Amount, LateFeePolicy, Payment, PaymentInput, PaymentRequest, ReferenceGenerator, RentCharge,
    Transaction, TransactionStatus, amount_too_large,
};
use crate::domain::ports::{GatewayBox, ListenerBox};
use crate::domain::receipt::{ReceiptFormatter, ReceiptView};
use crate::error::{PaymentError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Mutable state of the one checkout this orchestrator drives.
#[derive(Default)]
struct Session {
    state: CheckoutState,
    selection: Option<PaymentInput>,
    transaction: Option<Transaction>,
    countdown: Option<u32>,
    error: Option<CheckoutError>,
    receipt: Option<ReceiptView>,
    /// Bumped whenever an attempt starts, is cancelled, or is retried.
    /// Results carrying an older generation are discarded.
    generation: u64,
    cancel: Option<CancellationToken>,
}

impl Session {
    fn view(&self) -> CheckoutView {
        CheckoutView {
            state: self.state,
            method: self.selection.as_ref().map(PaymentInput::method),
            transaction_id: self.transaction.as_ref().map(|tx| tx.id.clone()),
            countdown: self.countdown,
            error: self.error.clone(),
            receipt: self.receipt.clone(),
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

/// Drives one rent payment from method selection to receipt.
///
/// Validation happens before any gateway call. Mobile-money payments are
/// confirmed by polling; card payments settle on the initiation reply.
/// Every failure ends in a [`CheckoutError`] on the published view, and the
/// success callback fires at most once.
pub struct PaymentOrchestrator {
    client: PaymentGatewayClient,
    poller: PaymentStatusPoller,
    listener: ListenerBox,
    receipts: ReceiptFormatter,
    late_fees: LateFeePolicy,
    confirmation_window: Duration,
    references: ReferenceGenerator,
    session: Mutex<Session>,
    view: watch::Sender<CheckoutView>,
}

impl PaymentOrchestrator {
    pub fn new(gateway: GatewayBox, listener: ListenerBox) -> Self {
        let client = PaymentGatewayClient::new(gateway);
        let (view, _) = watch::channel(CheckoutView::default());
        Self {
            poller: PaymentStatusPoller::new(client.clone()),
            client,
            listener,
            receipts: ReceiptFormatter::default(),
            late_fees: LateFeePolicy::default(),
            confirmation_window: crate::config::DEFAULT_CONFIRMATION_WINDOW,
            references: ReferenceGenerator::new(),
            session: Mutex::new(Session::default()),
            view,
        }
    }

    pub fn from_config(gateway: GatewayBox, listener: ListenerBox, config: &PortalConfig) -> Self {
        Self::new(gateway, listener)
            .with_polling(config.polling.max_attempts, config.polling.interval)
            .with_confirmation_window(config.confirmation_window)
            .with_late_fees(config.late_fees)
            .with_receipts(ReceiptFormatter::new(config.currency.clone()))
    }

    pub fn with_polling(mut self, max_attempts: u32, interval: Duration) -> Self {
        self.poller = self
            .poller
            .with_max_attempts(max_attempts)
            .with_interval(interval);
        self
    }

    pub fn with_confirmation_window(mut self, window: Duration) -> Self {
        self.confirmation_window = window;
        self
    }

    pub fn with_late_fees(mut self, policy: LateFeePolicy) -> Self {
        self.late_fees = policy;
        self
    }

    pub fn with_receipts(mut self, formatter: ReceiptFormatter) -> Self {
        self.receipts = formatter;
        self
    }

    /// Receives a new [`CheckoutView`] on every state change.
    pub fn subscribe(&self) -> watch::Receiver<CheckoutView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> CheckoutView {
        self.view.borrow().clone()
    }

    pub async fn transaction(&self) -> Option<Transaction> {
        self.session.lock().await.transaction.clone()
    }

    fn publish(&self, session: &Session) {
        self.view.send_replace(session.view());
    }

    pub async fn select_method(&self, input: PaymentInput) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.state != CheckoutState::MethodSelection {
            return Err(PaymentError::InvalidState {
                action: "select a payment method",
                state: session.state,
            });
        }
        info!(method = %input.method(), "Payment method selected");
        session.selection = Some(input);
        session.error = None;
        self.publish(&session);
        Ok(())
    }

    /// Runs one payment attempt for `charge` with the selected method.
    ///
    /// Payment failures are reported through the returned outcome and the
    /// published view; `Err` only signals a call made in the wrong state.
    pub async fn submit_payment(&self, charge: RentCharge) -> Result<CheckoutOutcome> {
        let (generation, cancel, request) = {
            let mut session = self.session.lock().await;
            if session.state != CheckoutState::MethodSelection {
                return Err(PaymentError::InvalidState {
                    action: "submit a payment",
                    state: session.state,
                });
            }
            session.generation += 1;
            let generation = session.generation;
            session.state = CheckoutState::Validating;
            session.error = None;
            self.publish(&session);

            let request = match self.prepare(session.selection.as_ref(), &charge, Utc::now()) {
                Ok(request) => request,
                Err(e) => {
                    let error = CheckoutError::validation(validation_message(e));
                    warn!(generation, message = %error.message, "Payment details rejected");
                    session.state = CheckoutState::MethodSelection;
                    session.error = Some(error.clone());
                    self.publish(&session);
                    return Ok(CheckoutOutcome::Rejected(error));
                }
            };

            let cancel = CancellationToken::new();
            session.cancel = Some(cancel.clone());
            session.state = CheckoutState::Initiating;
            self.publish(&session);
            (generation, cancel, request)
        };

        let initiation = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(CheckoutOutcome::Abandoned),
            result = self.client.initiate(&request) => result,
        };

        let transaction_id = match initiation {
            Err(e) => {
                warn!(generation, account_reference = %request.account_reference, error = %e, "Initiation failed");
                let error = CheckoutError::unreachable(
                    "We could not reach the payment service. Check your connection and try again.",
                );
                return Ok(self
                    .settle_failure(generation, CheckoutState::Failed, TransactionStatus::Failed, error)
                    .await);
            }
            Ok(initiation) => match initiation.transaction_id {
                Some(id) if initiation.success && !id.is_empty() => id,
                _ => {
                    warn!(generation, account_reference = %request.account_reference, message = %initiation.message, "Initiation rejected");
                    let message = if initiation.message.is_empty() {
                        "The payment request was not accepted. Please try again.".to_string()
                    } else {
                        initiation.message
                    };
                    return Ok(self
                        .settle_failure(
                            generation,
                            CheckoutState::Failed,
                            TransactionStatus::Failed,
                            CheckoutError::declined(message),
                        )
                        .await);
                }
            },
        };

        let transaction = Transaction::new(transaction_id, request, Utc::now());
        if !transaction.request.method().is_mobile_money() {
            // Card capture is synchronous: the initiation reply is final.
            return Ok(self.complete(generation, transaction).await);
        }

        self.await_confirmation(generation, &cancel, transaction)
            .await
    }

    async fn await_confirmation(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        transaction: Transaction,
    ) -> Result<CheckoutOutcome> {
        let window = u32::try_from(self.confirmation_window.as_secs()).unwrap_or(u32::MAX);
        {
            let mut session = self.session.lock().await;
            if !session.is_current(generation) {
                return Ok(CheckoutOutcome::Abandoned);
            }
            session.transaction = Some(transaction.clone());
            if window > 0 {
                session.state = CheckoutState::AwaitingConfirmation;
                session.countdown = Some(window);
            } else {
                session.state = CheckoutState::Polling;
            }
            self.publish(&session);
        }
        info!(
            generation,
            transaction_id = %transaction.id,
            window_secs = window,
            "Waiting for confirmation on handset"
        );

        let result = {
            let poll = self.poller.poll(&transaction.id, cancel);
            tokio::pin!(poll);
            let mut ticker =
                tokio::time::interval_at(Instant::now() + COUNTDOWN_TICK, COUNTDOWN_TICK);
            let mut remaining = window;

            loop {
                tokio::select! {
                    result = &mut poll => break result,
                    _ = ticker.tick(), if remaining > 0 => {
                        remaining -= 1;
                        if !self.tick_countdown(generation, remaining).await {
                            return Ok(CheckoutOutcome::Abandoned);
                        }
                    }
                }
            }
        };

        let outcome = match result {
            Ok(poll) => match poll.status {
                PollStatus::Success => self.complete(generation, transaction).await,
                PollStatus::Failed => {
                    let message = if poll.message.is_empty() {
                        "The payment was declined or cancelled on your phone.".to_string()
                    } else {
                        poll.message
                    };
                    self.settle_failure(
                        generation,
                        CheckoutState::Failed,
                        TransactionStatus::Failed,
                        CheckoutError::declined(message),
                    )
                    .await
                }
                PollStatus::Timeout => {
                    self.settle_failure(
                        generation,
                        CheckoutState::TimedOut,
                        TransactionStatus::Timeout,
                        CheckoutError::timed_out(),
                    )
                    .await
                }
            },
            Err(PaymentError::Cancelled) => CheckoutOutcome::Abandoned,
            Err(e) => {
                warn!(generation, transaction_id = %transaction.id, error = %e, "Payment status unknown");
                self.settle_failure(
                    generation,
                    CheckoutState::Failed,
                    TransactionStatus::Failed,
                    CheckoutError::status_unknown(transaction.request.account_reference.as_str()),
                )
                .await
            }
        };
        Ok(outcome)
    }

    /// Returns false once the attempt has been superseded.
    async fn tick_countdown(&self, generation: u64, remaining: u32) -> bool {
        let mut session = self.session.lock().await;
        if !session.is_current(generation) {
            return false;
        }
        if remaining == 0 {
            session.state = CheckoutState::Polling;
            session.countdown = None;
            debug!(generation, "Confirmation window elapsed, still polling");
        } else {
            session.countdown = Some(remaining);
        }
        self.publish(&session);
        true
    }

    async fn complete(&self, generation: u64, mut transaction: Transaction) -> CheckoutOutcome {
        let payment = {
            let mut session = self.session.lock().await;
            if !session.is_current(generation) || session.state == CheckoutState::Succeeded {
                warn!(generation, transaction_id = %transaction.id, "Discarding confirmation for superseded attempt");
                return CheckoutOutcome::Abandoned;
            }
            transaction.status = TransactionStatus::Success;
            let payment = Payment::completed(&transaction, Utc::now());
            session.receipt = Some(self.receipts.format(&payment));
            session.transaction = Some(transaction);
            session.state = CheckoutState::Succeeded;
            session.countdown = None;
            session.error = None;
            session.cancel = None;
            self.publish(&session);
            payment
        };

        info!(
            generation,
            transaction_id = %payment.transaction_id,
            account_reference = %payment.transaction_reference,
            amount = %payment.amount,
            method = %payment.method,
            "Payment completed"
        );
        self.listener.on_success(&payment);
        CheckoutOutcome::Completed(payment)
    }

    async fn settle_failure(
        &self,
        generation: u64,
        state: CheckoutState,
        status: TransactionStatus,
        error: CheckoutError,
    ) -> CheckoutOutcome {
        let mut session = self.session.lock().await;
        if !session.is_current(generation) {
            warn!(generation, ?state, "Discarding result for superseded attempt");
            return CheckoutOutcome::Abandoned;
        }
        if let Some(transaction) = session.transaction.as_mut() {
            transaction.status = status;
        }
        session.state = state;
        session.countdown = None;
        session.error = Some(error.clone());
        session.cancel = None;
        self.publish(&session);

        warn!(generation, kind = ?error.kind, title = %error.title, "Payment attempt ended without payment");
        match state {
            CheckoutState::TimedOut => CheckoutOutcome::TimedOut(error),
            _ => CheckoutOutcome::Failed(error),
        }
    }

    /// Closes the checkout. Stops polling; a charge already sent to the
    /// gateway is not reversed.
    pub async fn cancel(&self) {
        let previous = {
            let mut session = self.session.lock().await;
            if matches!(
                session.state,
                CheckoutState::Succeeded | CheckoutState::Cancelled
            ) {
                return;
            }
            let previous = session.state;
            session.generation += 1;
            if let Some(token) = session.cancel.take() {
                token.cancel();
            }
            let dropped = session.transaction.take();
            if let Some(transaction) = dropped.filter(|_| previous.is_in_flight()) {
                warn!(
                    transaction_id = %transaction.id,
                    "Checkout closed while payment in flight, gateway charge is not reversed"
                );
            }
            session.state = CheckoutState::Cancelled;
            session.countdown = None;
            session.error = None;
            self.publish(&session);
            previous
        };
        info!(
            from = %previous,
            in_flight = previous.is_in_flight(),
            "Checkout cancelled"
        );
        self.listener.on_cancel();
    }

    /// Discards the failed attempt and returns to method selection with the
    /// previous method kept. The next submit uses a fresh account reference.
    pub async fn retry(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if !session.state.is_retryable() {
            return Err(PaymentError::InvalidState {
                action: "retry",
                state: session.state,
            });
        }
        session.generation += 1;
        session.transaction = None;
        session.countdown = None;
        session.error = None;
        session.receipt = None;
        session.cancel = None;
        session.state = CheckoutState::MethodSelection;
        self.publish(&session);
        info!(generation = session.generation, "Retrying payment");
        Ok(())
    }

    fn prepare(
        &self,
        selection: Option<&PaymentInput>,
        charge: &RentCharge,
        now: DateTime<Utc>,
    ) -> Result<PaymentRequest> {
        let input = selection.ok_or_else(|| {
            PaymentError::ValidationError("Please select a payment method".to_string())
        })?;
        if charge.property_id.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "No property selected for this payment".to_string(),
            ));
        }
        let rent = Amount::new(charge.amount)?;
        let instrument = input.validate()?;

        let late_fee = self
            .late_fees
            .assess(rent, charge.due_date, now.date_naive())?;
        let amount = match late_fee {
            Some(fee) => Amount::new(
                rent.value()
                    .checked_add(fee)
                    .ok_or_else(amount_too_large)?,
            )?,
            None => rent,
        };

        Ok(PaymentRequest {
            amount,
            instrument,
            account_reference: self.references.next(&charge.property_id, now),
            property_id: charge.property_id.clone(),
            due_date: charge.due_date,
            late_fee,
        })
    }
}

fn validation_message(error: PaymentError) -> String {
    match error {
        PaymentError::ValidationError(message) => message,
        other => other.to_string(),
    }
}
