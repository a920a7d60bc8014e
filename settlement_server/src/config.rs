use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use settlement_engine::EngineConfig;
use sg_common::{helpers::parse_boolean_flag, FeeRate, Secret};

const DEFAULT_SGS_HOST: &str = "127.0.0.1";
const DEFAULT_SGS_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/settlement.db";
const DEFAULT_PAYIN_EXPIRY_HOURS: i64 = 24;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_NOTIFY_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_NOTIFY_BASE_DELAY_MS: u64 = 1_000;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Shared secret for the `X-Admin-Signature` HMAC on `/api/admin` routes.
    pub admin_secret: Secret<String>,
    /// If false, admin routes are served without checking the HMAC. **DANGER**. Only for local development.
    pub admin_auth_checks: bool,
    /// The externally visible base URL of this server. Providers are told to send callbacks to
    /// `{public_url}/callback/{gateway_code}`.
    pub public_url: String,
    /// How long to wait for a provider to answer a submission before the outcome is treated as unknown.
    pub gateway_timeout: StdDuration,
    /// Pending pay-ins older than this are marked as failed by the expiry worker.
    pub payin_expiry: Duration,
    pub notifier: NotifierConfig,
    pub default_payin_fee: FeeRate,
    pub default_payout_fee: FeeRate,
}

/// Retry schedule for merchant callbacks.
#[derive(Clone, Copy, Debug)]
pub struct NotifierConfig {
    pub max_attempts: u32,
    /// The delay before the first retry. Each subsequent retry waits twice as long as the one before.
    pub base_delay: StdDuration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_NOTIFY_MAX_ATTEMPTS,
            base_delay: StdDuration::from_millis(DEFAULT_NOTIFY_BASE_DELAY_MS),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SGS_HOST.to_string(),
            port: DEFAULT_SGS_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            admin_secret: Secret::default(),
            admin_auth_checks: true,
            public_url: format!("http://{DEFAULT_SGS_HOST}:{DEFAULT_SGS_PORT}"),
            gateway_timeout: StdDuration::from_secs(DEFAULT_GATEWAY_TIMEOUT_SECS),
            payin_expiry: Duration::hours(DEFAULT_PAYIN_EXPIRY_HOURS),
            notifier: NotifierConfig::default(),
            default_payin_fee: FeeRate::default(),
            default_payout_fee: FeeRate::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SGS_HOST").ok().unwrap_or_else(|| DEFAULT_SGS_HOST.into());
        let port = env::var("SGS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SGS_PORT. {e} Using the default, {DEFAULT_SGS_PORT}, instead."
                    );
                    DEFAULT_SGS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SGS_PORT);
        let database_url = env::var("SGS_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ SGS_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let admin_secret = env::var("SGS_ADMIN_SECRET").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SGS_ADMIN_SECRET is not set. Admin requests cannot be authorised until it is set to the secret \
                 shared with the identity provider."
            );
            String::default()
        });
        let admin_auth_checks = parse_boolean_flag(env::var("SGS_ADMIN_AUTH_CHECKS").ok(), true);
        if !admin_auth_checks {
            warn!("🚨️🚨️🚨️ Admin signature checks are DISABLED. Anyone can approve payouts. 🚨️🚨️🚨️");
        }
        let public_url = env::var("SGS_PUBLIC_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                let url = format!("http://{host}:{port}");
                warn!("🪛️ SGS_PUBLIC_URL is not set. Providers will be told to call back to {url}");
                url
            });
        let gateway_timeout =
            StdDuration::from_secs(env_number("SGS_GATEWAY_TIMEOUT_SECS", DEFAULT_GATEWAY_TIMEOUT_SECS));
        let payin_expiry = Duration::hours(env_number("SGS_PAYIN_EXPIRY_HOURS", DEFAULT_PAYIN_EXPIRY_HOURS));
        let notifier = NotifierConfig {
            max_attempts: env_number("SGS_NOTIFY_MAX_ATTEMPTS", DEFAULT_NOTIFY_MAX_ATTEMPTS).max(1),
            base_delay: StdDuration::from_millis(env_number("SGS_NOTIFY_BASE_DELAY_MS", DEFAULT_NOTIFY_BASE_DELAY_MS)),
        };
        let default_payin_fee = env_fee("SGS_DEFAULT_PAYIN_FEE");
        let default_payout_fee = env_fee("SGS_DEFAULT_PAYOUT_FEE");
        Self {
            host,
            port,
            database_url,
            admin_secret: Secret::new(admin_secret),
            admin_auth_checks,
            public_url,
            gateway_timeout,
            payin_expiry,
            notifier,
            default_payin_fee,
            default_payout_fee,
        }
    }

    /// The subset of the configuration the engine needs.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_payin_expiry(self.payin_expiry)
            .with_default_fees(self.default_payin_fee, self.default_payout_fee)
    }
}

fn env_number<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ Invalid configuration value for {name} ({s}). {e}. Using the default value of {default}.");
            default
        }),
        Err(_) => {
            info!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

/// Fee rates are given as percentages, e.g. `2.5`.
fn env_fee(name: &str) -> FeeRate {
    env::var(name)
        .ok()
        .and_then(|s| {
            s.parse::<FeeRate>()
                .map_err(|e| warn!("🪛️ Invalid fee rate for {name} ({s}). {e}. Using 0%."))
                .ok()
        })
        .unwrap_or_default()
}
