use std::time::Duration;

use sg_common::Secret;

use crate::data_objects::ProviderType;

pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything a client needs to talk to one upstream provider account.
///
/// Gateway profiles live in the database; the server builds one of these from the profile each time it talks to the
/// provider, so profile edits take effect without a restart.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub provider: ProviderType,
    /// Scheme, host and optional path prefix, without a trailing slash. e.g. `https://api.provider.example`
    pub base_url: String,
    /// Our account identifier at the provider.
    pub app_id: String,
    /// Signs pay-in requests and verifies callbacks.
    pub api_key: Secret<String>,
    /// Signs payout requests. Falls back to `api_key` when the provider uses a single key.
    pub payout_key: Option<Secret<String>>,
    pub currency: String,
    /// Provider-specific product / channel code.
    pub trade_type: String,
    /// Where the provider should send callbacks for this profile.
    pub notify_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(provider: ProviderType, base_url: &str, app_id: &str, api_key: Secret<String>) -> Self {
        Self {
            provider,
            base_url: base_url.trim_end_matches('/').to_string(),
            app_id: app_id.to_string(),
            api_key,
            payout_key: None,
            currency: "INR".to_string(),
            trade_type: String::new(),
            notify_url: String::new(),
            timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }

    pub fn with_payout_key(mut self, key: Option<Secret<String>>) -> Self {
        self.payout_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_ascii_uppercase();
        self
    }

    pub fn with_trade_type(mut self, trade_type: &str) -> Self {
        self.trade_type = trade_type.to_string();
        self
    }

    pub fn with_notify_url(mut self, url: &str) -> Self {
        self.notify_url = url.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn payout_secret(&self) -> &str {
        self.payout_key.as_ref().unwrap_or(&self.api_key).reveal()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}
