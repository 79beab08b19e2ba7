use crate::application::poller::{DEFAULT_INTERVAL, DEFAULT_MAX_ATTEMPTS};
use crate::domain::payment::LateFeePolicy;
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONFIRMATION_WINDOW: Duration = Duration::from_secs(30);
pub const DEFAULT_CURRENCY: &str = "KES";

/// Backend payment API connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            api_token: None,
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollingConfig {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortalConfig {
    pub gateway: GatewayConfig,
    pub polling: PollingConfig,
    /// How long the "enter your PIN" countdown runs after a push request.
    pub confirmation_window: Duration,
    pub currency: String,
    pub late_fees: LateFeePolicy,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            polling: PollingConfig::default(),
            confirmation_window: DEFAULT_CONFIRMATION_WINDOW,
            currency: DEFAULT_CURRENCY.to_string(),
            late_fees: LateFeePolicy::default(),
        }
    }
}

impl PortalConfig {
    /// Loads configuration from `RENTPAY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`; unset keys keep their defaults,
    /// set keys that do not parse are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let max_attempts =
            parse_var(&lookup, "RENTPAY_POLL_MAX_ATTEMPTS")?.unwrap_or(defaults.polling.max_attempts);
        if max_attempts == 0 {
            return Err(PaymentError::ConfigError(
                "RENTPAY_POLL_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        let percent: Option<Decimal> = parse_var(&lookup, "RENTPAY_LATE_FEE_PERCENT")?;
        if percent.is_some_and(|p| p < Decimal::ZERO) {
            return Err(PaymentError::ConfigError(
                "RENTPAY_LATE_FEE_PERCENT must not be negative".to_string(),
            ));
        }

        Ok(Self {
            gateway: GatewayConfig {
                base_url: lookup("RENTPAY_GATEWAY_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.gateway.base_url),
                api_token: lookup("RENTPAY_GATEWAY_TOKEN").filter(|t| !t.is_empty()),
                timeout: parse_var(&lookup, "RENTPAY_GATEWAY_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.gateway.timeout),
            },
            polling: PollingConfig {
                max_attempts,
                interval: parse_var(&lookup, "RENTPAY_POLL_INTERVAL_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.polling.interval),
            },
            confirmation_window: parse_var(&lookup, "RENTPAY_CONFIRMATION_WINDOW_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.confirmation_window),
            currency: lookup("RENTPAY_CURRENCY").unwrap_or(defaults.currency),
            late_fees: LateFeePolicy {
                percent,
                grace_days: parse_var(&lookup, "RENTPAY_LATE_FEE_GRACE_DAYS")?.unwrap_or(0),
            },
        })
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| PaymentError::ConfigError(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}
