//! Merchant callbacks.
//!
//! Every time an order reaches a final status, the merchant is told about it with a POST to the `callback_url` it gave
//! when creating the order:
//!
//! ```json
//! { "orderNo": "PO…", "merchantOrder": "W-1", "status": "success", "amount": "2000.00",
//!   "timestamp": "1717200000", "extra": "", "sign": "…" }
//! ```
//!
//! The body is signed with the sorted key=value scheme and the merchant's API key, so merchants verify every callback
//! the same way whatever gateway their orders go through. Delivery runs from the order-settled hook, after the state
//! change has committed, and is retried with exponential backoff. A merchant that never answers is logged and
//! otherwise ignored: the order's state does not depend on the merchant hearing about it.
use std::time::Duration;

use chrono::Utc;
use log::*;
use serde_json::{json, Value};
use settlement_engine::{db_types::Transaction, SettlementDatabase};
use sg_common::{SignatureScheme, SignedMessage, SignedParams, SIGN_FIELD};
use thiserror::Error;

use crate::config::NotifierConfig;

const MERCHANT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Could not deliver the callback. {0}")]
    Delivery(String),
    #[error("The merchant answered with HTTP {0}")]
    Rejected(u16),
}

/// How a callback body reaches the merchant.
#[allow(async_fn_in_trait)]
pub trait NotificationTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(MERCHANT_CALLBACK_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(Self { client })
    }
}

impl NotificationTransport for HttpTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<(), NotifyError> {
        let response =
            self.client.post(url).json(body).send().await.map_err(|e| NotifyError::Delivery(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Rejected(status.as_u16()))
        }
    }
}

#[derive(Clone)]
pub struct MerchantNotifier<B, T> {
    db: B,
    transport: T,
    config: NotifierConfig,
}

impl<B, T> MerchantNotifier<B, T>
where
    B: SettlementDatabase,
    T: NotificationTransport,
{
    pub fn new(db: B, transport: T, config: NotifierConfig) -> Self {
        Self { db, transport, config }
    }

    /// Tells the merchant that `order` is final. Returns true if the merchant acknowledged the callback.
    pub async fn notify(&self, order: &Transaction) -> bool {
        if order.callback_url.is_empty() {
            trace!("📣️ Order {} has no callback url. Nothing to do.", order.order_no);
            return false;
        }
        let merchant = match self.db.fetch_merchant(order.merchant_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                error!("📣️ Merchant #{} for order {} does not exist", order.merchant_id, order.order_no);
                return false;
            },
            Err(e) => {
                error!("📣️ Could not load merchant #{} to notify about {}. {e}", order.merchant_id, order.order_no);
                return false;
            },
        };
        let body = notification_body(order, merchant.api_key.reveal(), Utc::now().timestamp());
        self.deliver(&order.callback_url, &body, order).await
    }

    async fn deliver(&self, url: &str, body: &Value, order: &Transaction) -> bool {
        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            match self.transport.post(url, body).await {
                Ok(()) => {
                    info!("📣️ Merchant notified about {} ({}) on attempt {attempt}", order.order_no, order.status);
                    return true;
                },
                Err(e) if attempt < attempts => {
                    let delay = backoff(self.config.base_delay, attempt);
                    debug!(
                        "📣️ Callback for {} failed on attempt {attempt}/{attempts}. {e}. Retrying in {}ms",
                        order.order_no,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    warn!("📣️ Giving up on the callback for {} to {url} after {attempts} tries. {e}", order.order_no);
                },
            }
        }
        false
    }
}

/// Delay after the `attempt`th failure: `base`, `2 × base`, `4 × base`, …
fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

pub fn notification_body(order: &Transaction, api_key: &str, timestamp: i64) -> Value {
    let mut params = SignedParams::new();
    params.insert("orderNo".into(), order.order_no.to_string());
    params.insert("merchantOrder".into(), order.merchant_order_no.clone());
    params.insert("status".into(), order.status.to_string());
    params.insert("amount".into(), order.amount.to_string());
    params.insert("timestamp".into(), timestamp.to_string());
    params.insert("extra".into(), order.extra.clone().unwrap_or_default());
    let sign = SignatureScheme::SortedKeyValue.sign(SignedMessage::MerchantNotification, &params, api_key);
    params.insert(SIGN_FIELD.into(), sign);
    json!(params)
}
