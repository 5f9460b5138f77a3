//! Engine configuration.
//!
//! There is no process-wide configuration singleton. A [`GatewayConfig`] is built once (usually via
//! [`GatewayConfig::from_env_or_default`]) and handed to the engine and the REST client at construction time.

use std::{env, str::FromStr, time::Duration};

use log::*;
use spg_common::{parse_boolean_flag, Secret};

use crate::db_types::Currency;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
const SANDBOX_BASE_URL: &str = "https://sandbox.sslcommerz.com";
const PRODUCTION_BASE_URL: &str = "https://securepay.sslcommerz.com";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub store_id: String,
    pub store_password: Secret<String>,
    /// When true, calls go to the gateway's sandbox environment.
    pub sandbox: bool,
    pub currency: Currency,
    /// Timeout applied to each outbound gateway call.
    pub timeout: Duration,
    /// How many times a transport-level failure is retried before surfacing an adapter error.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on each subsequent one.
    pub retry_backoff: Duration,
    /// When false, IPNs are dispositioned from their own claims without the authoritative validation call.
    /// **DANGER**: only sensible for offline replay tooling.
    pub auto_validate_ipn: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            store_id: String::default(),
            store_password: Secret::default(),
            sandbox: true,
            currency: Currency::default(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            auto_validate_ipn: true,
        }
    }
}

impl GatewayConfig {
    pub fn new(store_id: &str, store_password: Secret<String>) -> Self {
        Self { store_id: store_id.to_string(), store_password, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let store_id = env::var("SPG_STORE_ID").ok().unwrap_or_else(|| {
            error!("🪛️ SPG_STORE_ID is not set. Gateway calls will be rejected for bad credentials.");
            String::default()
        });
        let store_password = env::var("SPG_STORE_PASSWORD").map(Secret::new).ok().unwrap_or_else(|| {
            error!("🪛️ SPG_STORE_PASSWORD is not set. Gateway calls will be rejected for bad credentials.");
            Secret::default()
        });
        let sandbox = parse_boolean_flag(env::var("SPG_SANDBOX").ok(), true);
        let currency = env::var("SPG_CURRENCY")
            .ok()
            .map(|s| {
                Currency::from_str(&s).unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid value for SPG_CURRENCY. {e} Using the default instead.");
                    Currency::default()
                })
            })
            .unwrap_or_default();
        let timeout = duration_from_env("SPG_TIMEOUT_SECS", DEFAULT_TIMEOUT, Duration::from_secs);
        let retry_backoff = duration_from_env("SPG_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF, Duration::from_millis);
        let max_retries = env::var("SPG_MAX_RETRIES")
            .ok()
            .map(|s| {
                s.parse::<u32>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid value for SPG_MAX_RETRIES. {e} Using {DEFAULT_MAX_RETRIES} instead.");
                    DEFAULT_MAX_RETRIES
                })
            })
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let auto_validate_ipn = parse_boolean_flag(env::var("SPG_AUTO_VALIDATE_IPN").ok(), true);
        if !auto_validate_ipn {
            warn!("🪛️ SPG_AUTO_VALIDATE_IPN is disabled. IPNs will NOT be checked against the validation API.");
        }
        Self { store_id, store_password, sandbox, currency, timeout, max_retries, retry_backoff, auto_validate_ipn }
    }

    /// True when signature verification can actually run, i.e. a store password is configured.
    pub fn can_verify_signatures(&self) -> bool {
        !self.store_password.reveal().is_empty()
    }

    pub fn base_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_BASE_URL
        } else {
            PRODUCTION_BASE_URL
        }
    }

    pub fn validation_url(&self) -> String {
        format!("{}/validator/api/validationserverAPI.php", self.base_url())
    }

    pub fn refund_url(&self) -> String {
        format!("{}/gwprocess/v4/api.php", self.base_url())
    }
}

fn duration_from_env(var: &str, default: Duration, ctor: fn(u64) -> Duration) -> Duration {
    env::var(var)
        .ok()
        .map(|s| {
            s.parse::<u64>().map(ctor).unwrap_or_else(|e| {
                error!("🪛️ {s} is not a valid value for {var}. {e} Using the default instead.");
                default
            })
        })
        .unwrap_or(default)
}
