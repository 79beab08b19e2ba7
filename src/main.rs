use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use miette::{IntoDiagnostic, Result, miette};
use rentpay::application::orchestrator::PaymentOrchestrator;
use rentpay::config::PortalConfig;
use rentpay::domain::checkout::{CheckoutOutcome, CheckoutState};
use rentpay::domain::payment::{MobileProvider, Payment, PaymentInput, RentCharge};
use rentpay::domain::ports::{CheckoutListener, GatewayBox, Initiation};
use rentpay::infrastructure::http::HttpGateway;
use rentpay::infrastructure::scripted::ScriptedGateway;
use rentpay::interfaces::csv::receipt_writer::ReceiptWriter;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Mpesa,
    Airtel,
    Telkom,
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GatewayArg {
    /// In-process gateway with a scripted outcome
    Scripted,
    /// Backend REST API at RENTPAY_GATEWAY_URL
    Http,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutcomeArg {
    Success,
    Failed,
    Pending,
    Rejected,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Text,
    Json,
    Csv,
}

#[derive(Parser)]
#[command(author, version, about = "Pay rent by mobile money or card", long_about = None)]
struct Cli {
    /// Rent amount due
    #[arg(long)]
    amount: Decimal,

    /// Property the rent is for
    #[arg(long)]
    property: String,

    /// Rent due date (YYYY-MM-DD)
    #[arg(long)]
    due_date: NaiveDate,

    #[arg(long, value_enum)]
    method: MethodArg,

    /// Mobile-money phone number, required for mpesa/airtel/telkom
    #[arg(long)]
    phone: Option<String>,

    /// Card token from the card form, required for card
    #[arg(long)]
    card_token: Option<String>,

    #[arg(long, value_enum, default_value_t = GatewayArg::Scripted)]
    gateway: GatewayArg,

    /// Outcome the scripted gateway reports
    #[arg(long, value_enum, default_value_t = OutcomeArg::Success)]
    outcome: OutcomeArg,

    /// Pending status replies before the scripted outcome
    #[arg(long, default_value_t = 2)]
    pending_polls: usize,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Status checks before giving up, at least 1
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,

    #[arg(long)]
    confirmation_window_secs: Option<u64>,

    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    /// Write the receipt to this file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn payment_input(&self) -> PaymentInput {
        let provider = match self.method {
            MethodArg::Mpesa => MobileProvider::Mpesa,
            MethodArg::Airtel => MobileProvider::Airtel,
            MethodArg::Telkom => MobileProvider::Telkom,
            MethodArg::Card => {
                return PaymentInput::Card {
                    card_token: self.card_token.clone().unwrap_or_default(),
                };
            }
        };
        PaymentInput::MobileMoney {
            provider,
            phone: self.phone.clone().unwrap_or_default(),
        }
    }

    fn scripted_gateway(&self) -> ScriptedGateway {
        match self.outcome {
            OutcomeArg::Success => ScriptedGateway::succeeding_after(self.pending_polls),
            OutcomeArg::Failed => ScriptedGateway::declining_after(self.pending_polls),
            OutcomeArg::Pending => ScriptedGateway::new(),
            OutcomeArg::Rejected => ScriptedGateway::new().with_initiation(Initiation::rejected(
                "Payment request rejected by provider",
            )),
        }
    }
}

struct ConsoleListener;

impl CheckoutListener for ConsoleListener {
    fn on_success(&self, payment: &Payment) {
        info!(
            transaction_id = %payment.transaction_id,
            amount = %payment.amount,
            "Rent payment received"
        );
    }

    fn on_cancel(&self) {
        info!("Payment closed by user");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = PortalConfig::from_env().into_diagnostic()?;
    if let Some(ms) = cli.poll_interval_ms {
        config.polling.interval = Duration::from_millis(ms);
    }
    if let Some(attempts) = cli.max_attempts {
        config.polling.max_attempts = attempts;
    }
    if let Some(secs) = cli.confirmation_window_secs {
        config.confirmation_window = Duration::from_secs(secs);
    }

    let gateway: GatewayBox = match cli.gateway {
        GatewayArg::Http => Arc::new(HttpGateway::new(config.gateway.clone()).into_diagnostic()?),
        GatewayArg::Scripted => Arc::new(cli.scripted_gateway()),
    };
    let orchestrator =
        PaymentOrchestrator::from_config(gateway, Arc::new(ConsoleListener), &config);

    let mut views = orchestrator.subscribe();
    tokio::spawn(async move {
        let mut last_state = CheckoutState::default();
        while views.changed().await.is_ok() {
            let view = views.borrow_and_update().clone();
            if view.state != last_state {
                info!(state = %view.state, transaction_id = ?view.transaction_id, "Checkout state changed");
                last_state = view.state;
            } else if let Some(seconds) = view.countdown {
                debug!(seconds, "Waiting for PIN entry");
            }
        }
    });

    orchestrator
        .select_method(cli.payment_input())
        .await
        .into_diagnostic()?;
    let charge = RentCharge::new(cli.amount, cli.due_date, cli.property.clone());

    let outcome = tokio::select! {
        outcome = orchestrator.submit_payment(charge) => outcome.into_diagnostic()?,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel().await;
            return Err(miette!("Payment cancelled"));
        }
    };

    match outcome {
        CheckoutOutcome::Completed(_) => {
            let receipt = orchestrator
                .view()
                .receipt
                .ok_or_else(|| miette!("Payment completed without a receipt"))?;
            let mut out: Box<dyn Write> = match &cli.output {
                Some(path) => Box::new(File::create(path).into_diagnostic()?),
                None => Box::new(io::stdout().lock()),
            };
            match cli.format {
                FormatArg::Text => writeln!(out, "{receipt}").into_diagnostic()?,
                FormatArg::Json => writeln!(
                    out,
                    "{}",
                    serde_json::to_string_pretty(&receipt).into_diagnostic()?
                )
                .into_diagnostic()?,
                FormatArg::Csv => ReceiptWriter::new(&mut out)
                    .write_receipts([&receipt])
                    .into_diagnostic()?,
            }
            out.flush().into_diagnostic()?;
            Ok(())
        }
        CheckoutOutcome::Rejected(error)
        | CheckoutOutcome::Failed(error)
        | CheckoutOutcome::TimedOut(error) => Err(miette!("{error}")),
        CheckoutOutcome::Abandoned => Err(miette!("Payment cancelled")),
    }
}
