//! Glue between the engine's [`UpstreamGateway`] seam and the provider clients in `gateway_tools`.
//!
//! Gateway profiles live in the database, so a client is built from the profile on every call. Profile edits (new
//! keys, a new base URL) take effect immediately.
use std::time::Duration;

use gateway_tools::{
    AccountKind,
    CallbackOutcome as ProviderOutcome,
    GatewayApi,
    GatewayApiError,
    GatewayConfig,
    PayinRequest,
    PayoutAccount,
    PayoutRequest,
    ProviderType,
};
use log::*;
use serde_json::Value;
use settlement_engine::{
    db_types::{Destination, GatewayType, OrderNo, PaymentGateway, Transaction},
    traits::{CallbackOutcome, CallbackTranslation, PayinSubmitted, PayoutSubmitted, UpstreamError, UpstreamGateway},
};

#[derive(Debug, Clone)]
pub struct ProviderGateways {
    /// Base URL that providers can reach us on. Callbacks go to `{public_url}/callback/{gateway_code}`.
    public_url: String,
    timeout: Duration,
}

impl ProviderGateways {
    pub fn new(public_url: &str, timeout: Duration) -> Self {
        Self { public_url: public_url.trim_end_matches('/').to_string(), timeout }
    }

    pub fn notify_url(&self, gateway: &PaymentGateway) -> String {
        format!("{}/callback/{}", self.public_url, gateway.code)
    }

    fn client(&self, gateway: &PaymentGateway) -> Result<GatewayApi, UpstreamError> {
        let config = GatewayConfig::new(
            provider_type(gateway.gateway_type),
            &gateway.base_url,
            &gateway.app_id,
            gateway.api_key.clone(),
        )
        .with_payout_key(Some(gateway.payout_key.clone()))
        .with_currency(&gateway.currency)
        .with_trade_type(&gateway.trade_type)
        .with_notify_url(&self.notify_url(gateway))
        .with_timeout(self.timeout);
        GatewayApi::new(config).map_err(|e| {
            error!("🌐️ Could not build a client for gateway {}. {e}", gateway.code);
            UpstreamError::Network(e.to_string())
        })
    }
}

impl UpstreamGateway for ProviderGateways {
    async fn submit_payin(
        &self,
        gateway: &PaymentGateway,
        order: &Transaction,
    ) -> Result<PayinSubmitted, UpstreamError> {
        let request = PayinRequest {
            order_no: order.order_no.to_string(),
            amount: order.amount,
            currency: order.currency.clone(),
            notify_url: self.notify_url(gateway),
        };
        let submission = self.client(gateway)?.submit_payin(&request).await.map_err(upstream_error)?;
        Ok(PayinSubmitted {
            provider_order_id: submission.provider_order_id,
            payment_url: submission.payment_url,
            raw: submission.raw,
        })
    }

    async fn submit_payout(
        &self,
        gateway: &PaymentGateway,
        order: &Transaction,
    ) -> Result<PayoutSubmitted, UpstreamError> {
        let destination = order
            .destination()
            .ok_or_else(|| UpstreamError::Unsupported(format!("Payout {} has no destination", order.order_no)))?;
        let request = PayoutRequest {
            order_no: order.order_no.to_string(),
            amount: order.amount,
            currency: order.currency.clone(),
            account: payout_account(destination),
            notify_url: self.notify_url(gateway),
        };
        let submission = self.client(gateway)?.submit_payout(&request).await.map_err(upstream_error)?;
        Ok(PayoutSubmitted { provider_order_id: submission.provider_order_id, raw: submission.raw })
    }

    fn translate_callback(
        &self,
        gateway: &PaymentGateway,
        payload: &Value,
    ) -> Result<CallbackTranslation, UpstreamError> {
        let callback = self.client(gateway)?.parse_callback(payload.clone()).map_err(upstream_error)?;
        let outcome = match callback.outcome {
            ProviderOutcome::Success => CallbackOutcome::Success,
            ProviderOutcome::Failed => CallbackOutcome::Failed,
            ProviderOutcome::Processing => CallbackOutcome::Processing,
        };
        Ok(CallbackTranslation {
            order_no: OrderNo::from(callback.order_no),
            provider_order_id: callback.provider_order_id,
            amount: callback.amount,
            outcome,
            raw: callback.raw,
        })
    }

    fn supports_destination(&self, gateway: &PaymentGateway, destination: &Destination) -> bool {
        let kind = match destination {
            Destination::Bank { .. } => AccountKind::Bank,
            Destination::MobileWallet { .. } => AccountKind::MobileWallet,
            Destination::Usdt { .. } => AccountKind::Usdt,
        };
        provider_type(gateway.gateway_type).supports_account(&gateway.currency, kind)
    }
}

fn provider_type(gateway_type: GatewayType) -> ProviderType {
    match gateway_type {
        GatewayType::BankTransfer => ProviderType::BankTransfer,
        GatewayType::UnifiedApi => ProviderType::UnifiedApi,
    }
}

fn payout_account(destination: &Destination) -> PayoutAccount {
    match destination.clone() {
        Destination::Bank { account_number, ifsc_code, bank_name, account_holder_name } => {
            PayoutAccount::Bank { account_number, ifsc_code, bank_name, account_holder_name }
        },
        Destination::MobileWallet { wallet, phone, account_name } => {
            PayoutAccount::MobileWallet { wallet, phone, account_name }
        },
        Destination::Usdt { network, address } => PayoutAccount::Usdt { network, address },
    }
}

fn upstream_error(e: GatewayApiError) -> UpstreamError {
    match e {
        GatewayApiError::Rejected { .. } => UpstreamError::Rejected(e.to_string()),
        GatewayApiError::Network(_) | GatewayApiError::Initialization(_) => UpstreamError::Network(e.to_string()),
        GatewayApiError::OutcomeUnknown(_) => UpstreamError::OutcomeUnknown(e.to_string()),
        GatewayApiError::UnsupportedAccount(_) => UpstreamError::Unsupported(e.to_string()),
        GatewayApiError::InvalidCallback(_) => UpstreamError::InvalidCallback(e.to_string()),
        GatewayApiError::CallbackSignatureInvalid => UpstreamError::SignatureInvalid,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn definite_failures_stay_definite() {
        let rejected = upstream_error(GatewayApiError::Rejected { code: "400".into(), message: "bad ifsc".into() });
        assert!(rejected.is_definite_failure());
        assert!(upstream_error(GatewayApiError::Network("refused".into())).is_definite_failure());
        assert!(!upstream_error(GatewayApiError::OutcomeUnknown("timeout".into())).is_definite_failure());
        assert!(matches!(upstream_error(GatewayApiError::CallbackSignatureInvalid), UpstreamError::SignatureInvalid));
    }

    #[test]
    fn callbacks_come_back_to_us() {
        let gateways = ProviderGateways::new("https://sgs.example.com/", Duration::from_secs(5));
        let gateway: PaymentGateway = serde_json::from_value(serde_json::json!({
            "id": 1, "code": "upi-inr", "gateway_type": "unified_api", "base_url": "https://p.example", "app_id": "A",
            "currency": "INR", "trade_type": "", "min_withdrawal": 0, "is_active": true,
            "created_at": "2024-06-01T00:00:00Z", "updated_at": "2024-06-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(gateways.notify_url(&gateway), "https://sgs.example.com/callback/upi-inr");
        let bank = Destination::Bank {
            account_number: "1".into(),
            ifsc_code: "HDFC0001234".into(),
            bank_name: "HDFC".into(),
            account_holder_name: "A".into(),
        };
        let usdt = Destination::Usdt { network: "TRC20".into(), address: "T9yD".into() };
        assert!(gateways.supports_destination(&gateway, &bank));
        assert!(!gateways.supports_destination(&gateway, &usdt));
    }
}
