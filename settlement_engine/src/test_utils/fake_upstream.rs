//! An in-memory provider for tests.
//!
//! It accepts or refuses submissions according to a scripted [`UpstreamBehaviour`], counts what it receives, and
//! understands a tiny signed callback format:
//!
//! ```json
//! { "order_no": "PO…", "provider_order_id": "UP-1", "amount": "2000.00", "status": "SUCCESS", "sign": "…" }
//! ```
//!
//! signed with the gateway's scheme and API key as a [`SignedMessage::ProviderCallback`].
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
    Mutex,
};

use serde_json::{json, Value};
use sg_common::{Money, SignedMessage, SignedParams, SIGN_FIELD};

use crate::{
    db_types::{Destination, OrderNo, PaymentGateway, Transaction},
    traits::{CallbackOutcome, CallbackTranslation, PayinSubmitted, PayoutSubmitted, UpstreamError, UpstreamGateway},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamBehaviour {
    #[default]
    Accept,
    Reject,
    Unreachable,
    Timeout,
}

#[derive(Debug, Clone, Default)]
pub struct FakeUpstream {
    behaviour: Arc<Mutex<UpstreamBehaviour>>,
    payins: Arc<AtomicUsize>,
    payouts: Arc<AtomicUsize>,
    /// When false, payouts to USDT addresses are refused as unsupported.
    pub supports_usdt: bool,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self { supports_usdt: true, ..Default::default() }
    }

    pub fn set_behaviour(&self, behaviour: UpstreamBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn payin_count(&self) -> usize {
        self.payins.load(Ordering::SeqCst)
    }

    pub fn payout_count(&self) -> usize {
        self.payouts.load(Ordering::SeqCst)
    }

    fn outcome(&self, order: &Transaction) -> Result<String, UpstreamError> {
        match *self.behaviour.lock().unwrap() {
            UpstreamBehaviour::Accept => Ok(format!("UP-{}", order.order_no)),
            UpstreamBehaviour::Reject => Err(UpstreamError::Rejected("insufficient provider float".into())),
            UpstreamBehaviour::Unreachable => Err(UpstreamError::Network("connection refused".into())),
            UpstreamBehaviour::Timeout => Err(UpstreamError::OutcomeUnknown("request timed out".into())),
        }
    }
}

impl UpstreamGateway for FakeUpstream {
    async fn submit_payin(
        &self,
        _gateway: &PaymentGateway,
        order: &Transaction,
    ) -> Result<PayinSubmitted, UpstreamError> {
        self.payins.fetch_add(1, Ordering::SeqCst);
        let provider_order_id = self.outcome(order)?;
        let payment_url = Some(format!("https://pay.example.com/{provider_order_id}"));
        let raw = json!({ "status": "SUCCESS", "order_id": provider_order_id });
        Ok(PayinSubmitted { provider_order_id, payment_url, raw })
    }

    async fn submit_payout(
        &self,
        _gateway: &PaymentGateway,
        order: &Transaction,
    ) -> Result<PayoutSubmitted, UpstreamError> {
        self.payouts.fetch_add(1, Ordering::SeqCst);
        let provider_order_id = self.outcome(order)?;
        let raw = json!({ "status": "SUCCESS", "payout_id": provider_order_id });
        Ok(PayoutSubmitted { provider_order_id, raw })
    }

    fn translate_callback(
        &self,
        gateway: &PaymentGateway,
        payload: &Value,
    ) -> Result<CallbackTranslation, UpstreamError> {
        let params = callback_params(payload);
        let scheme = gateway.gateway_type.signature_scheme();
        if !scheme.verify_params(SignedMessage::ProviderCallback, &params, gateway.api_key.reveal()) {
            return Err(UpstreamError::SignatureInvalid);
        }
        let order_no = params
            .get("order_no")
            .map(|s| OrderNo::from(s.as_str()))
            .ok_or_else(|| UpstreamError::InvalidCallback("missing order_no".into()))?;
        let outcome = match params.get("status").map(String::as_str) {
            Some("SUCCESS") => CallbackOutcome::Success,
            Some("FAILED") => CallbackOutcome::Failed,
            Some("PROCESSING") => CallbackOutcome::Processing,
            other => return Err(UpstreamError::InvalidCallback(format!("unknown status {other:?}"))),
        };
        let amount = match params.get("amount") {
            Some(a) => Some(a.parse::<Money>().map_err(|e| UpstreamError::InvalidCallback(e.to_string()))?),
            None => None,
        };
        Ok(CallbackTranslation {
            order_no,
            provider_order_id: params.get("provider_order_id").cloned(),
            amount,
            outcome,
            raw: payload.clone(),
        })
    }

    fn supports_destination(&self, _gateway: &PaymentGateway, destination: &Destination) -> bool {
        self.supports_usdt || !matches!(destination, Destination::Usdt { .. })
    }
}

fn callback_params(payload: &Value) -> SignedParams {
    payload
        .as_object()
        .map(|m| m.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

/// Builds a correctly signed callback for `order` as the fake provider would send it.
pub fn signed_callback(gateway: &PaymentGateway, order: &Transaction, status: &str) -> Value {
    let mut params = SignedParams::new();
    params.insert("order_no".into(), order.order_no.to_string());
    params.insert("provider_order_id".into(), order.provider_order_id.clone().unwrap_or_default());
    params.insert("amount".into(), order.amount.to_string());
    params.insert("status".into(), status.to_string());
    let scheme = gateway.gateway_type.signature_scheme();
    let sign = scheme.sign(SignedMessage::ProviderCallback, &params, gateway.api_key.reveal());
    params.insert(SIGN_FIELD.into(), sign);
    json!(params)
}
