use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Response,
};
use serde_json::Value;
use sg_common::SignedParams;

use crate::{
    config::GatewayConfig,
    data_objects::{PayinRequest, PayinSubmission, PayoutRequest, PayoutSubmission, ProviderCallback, ProviderType},
    providers::{bank_transfer, unified_api},
    GatewayApiError,
};

/// A client for one upstream provider account.
///
/// The methods here never decide what happens to an order. They report what the provider said, classified so that
/// the caller can tell a definite refusal from an unknown outcome (see [`GatewayApiError::is_definite_failure`]).
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub async fn submit_payin(&self, req: &PayinRequest) -> Result<PayinSubmission, GatewayApiError> {
        let provider = self.config.provider;
        debug!("🌐️ Submitting pay-in {} for {} {} to {provider}", req.order_no, req.amount, req.currency);
        let result = match self.config.provider {
            ProviderType::BankTransfer => {
                let params = bank_transfer::payin_params(&self.config, req);
                let response = self.post_form(bank_transfer::PAYIN_PATH, &params).await?;
                bank_transfer::parse_payin_response(response)
            },
            ProviderType::UnifiedApi => {
                let body = unified_api::payin_body(&self.config, req, now_ms());
                let response = self.post_json(unified_api::PAYIN_PATH, &body).await?;
                unified_api::parse_payin_response(response)
            },
        };
        match &result {
            Ok(s) => info!("🌐️ Pay-in {} accepted by provider as {}", req.order_no, s.provider_order_id),
            Err(e) => warn!("🌐️ Pay-in {} was not accepted by the provider. {e}", req.order_no),
        }
        result
    }

    pub async fn submit_payout(&self, req: &PayoutRequest) -> Result<PayoutSubmission, GatewayApiError> {
        if !self.config.provider.supports_account(&req.currency, req.account.kind()) {
            return Err(GatewayApiError::UnsupportedAccount(format!(
                "{} does not support {:?} payouts in {}",
                self.config.provider,
                req.account.kind(),
                req.currency
            )));
        }
        let provider = self.config.provider;
        debug!("🌐️ Submitting payout {} for {} {} to {provider}", req.order_no, req.amount, req.currency);
        let result = match self.config.provider {
            ProviderType::BankTransfer => {
                let params = bank_transfer::payout_params(&self.config, req)?;
                let response = self.post_form(bank_transfer::PAYOUT_PATH, &params).await?;
                bank_transfer::parse_payout_response(response)
            },
            ProviderType::UnifiedApi => {
                let body = unified_api::payout_body(&self.config, req, now_ms());
                let response = self.post_json(unified_api::PAYOUT_PATH, &body).await?;
                unified_api::parse_payout_response(response)
            },
        };
        match &result {
            Ok(s) => info!("🌐️ Payout {} accepted by provider as {}", req.order_no, s.provider_order_id),
            Err(e) => warn!("🌐️ Payout {} was not accepted by the provider. {e}", req.order_no),
        }
        result
    }

    /// Verifies and translates a callback payload. Form-encoded callbacks should be converted into a flat JSON object
    /// of strings first.
    pub fn parse_callback(&self, payload: Value) -> Result<ProviderCallback, GatewayApiError> {
        match self.config.provider {
            ProviderType::BankTransfer => bank_transfer::parse_callback(&self.config, payload),
            ProviderType::UnifiedApi => unified_api::parse_callback(&self.config, payload),
        }
    }

    async fn post_form(&self, path: &str, params: &SignedParams) -> Result<Value, GatewayApiError> {
        let url = self.config.url(path);
        trace!("🌐️ POST (form) {url}");
        let response = self.client.post(url).form(params).send().await?;
        read_response(response).await
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, GatewayApiError> {
        let url = self.config.url(path);
        trace!("🌐️ POST (json) {url}");
        let response = self.client.post(url).json(body).send().await?;
        read_response(response).await
    }
}

/// Classifies an HTTP response. A 4xx means the provider looked at the request and refused it. A 5xx, or a 2xx whose
/// body we cannot read, tells us nothing certain about whether the request was acted on.
async fn read_response(response: Response) -> Result<Value, GatewayApiError> {
    let status = response.status();
    if status.is_success() {
        trace!("🌐️ Provider responded with {status}");
        let text = response.text().await.map_err(|e| GatewayApiError::OutcomeUnknown(e.to_string()))?;
        serde_json::from_str::<Value>(&text)
            .map_err(|e| GatewayApiError::OutcomeUnknown(format!("Could not parse provider response ({e}): {text}")))
    } else if status.is_client_error() {
        let message = response.text().await.unwrap_or_default();
        Err(GatewayApiError::Rejected { code: status.as_u16().to_string(), message })
    } else {
        let message = response.text().await.unwrap_or_default();
        Err(GatewayApiError::OutcomeUnknown(format!("HTTP {status}. {message}")))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
