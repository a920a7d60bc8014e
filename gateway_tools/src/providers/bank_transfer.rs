//! Form-encoded INR bank transfer provider.
//!
//! Requests are `application/x-www-form-urlencoded` posts. Amounts are major units with two decimals. Every request
//! and callback is signed with [`SignatureScheme::OrderedConcat`] over the field sequence of the message kind.
//!
//! Responses look like `{"status": "SUCCESS" | "FAILED", "message": "...", "data": {...}}`.
use serde_json::Value;
use sg_common::{Money, SignatureScheme, SignedMessage, SignedParams, SIGN_FIELD};

use crate::{
    helpers::{json_str, params_from_json},
    CallbackOutcome,
    GatewayApiError,
    GatewayConfig,
    PayinRequest,
    PayinSubmission,
    PayoutAccount,
    PayoutRequest,
    PayoutSubmission,
    ProviderCallback,
};

pub const PAYIN_PATH: &str = "/api/payin";
pub const PAYOUT_PATH: &str = "/api/payout";

const SCHEME: SignatureScheme = SignatureScheme::OrderedConcat;

fn insert(params: &mut SignedParams, key: &str, value: impl Into<String>) {
    params.insert(key.to_string(), value.into());
}

pub fn payin_params(config: &GatewayConfig, req: &PayinRequest) -> SignedParams {
    let mut params = SignedParams::new();
    insert(&mut params, "merchant_id", config.app_id.as_str());
    insert(&mut params, "amount", req.amount.to_string());
    insert(&mut params, "transaction_id", req.order_no.as_str());
    insert(&mut params, "callback_url", req.notify_url.as_str());
    insert(&mut params, "currency", req.currency.as_str());
    if !config.trade_type.is_empty() {
        insert(&mut params, "trade_type", config.trade_type.as_str());
    }
    let sign = SCHEME.sign(SignedMessage::Payin, &params, config.api_key.reveal());
    insert(&mut params, SIGN_FIELD, sign);
    params
}

pub fn payout_params(config: &GatewayConfig, req: &PayoutRequest) -> Result<SignedParams, GatewayApiError> {
    let PayoutAccount::Bank { account_number, ifsc_code, bank_name, account_holder_name } = &req.account else {
        return Err(GatewayApiError::UnsupportedAccount(
            "The bank transfer provider only pays out to bank accounts".to_string(),
        ));
    };
    let mut params = SignedParams::new();
    insert(&mut params, "merchant_id", config.app_id.as_str());
    insert(&mut params, "amount", req.amount.to_string());
    insert(&mut params, "transaction_id", req.order_no.as_str());
    insert(&mut params, "callback_url", req.notify_url.as_str());
    insert(&mut params, "account_number", account_number.as_str());
    insert(&mut params, "ifsc_code", ifsc_code.as_str());
    insert(&mut params, "bank_name", bank_name.as_str());
    insert(&mut params, "account_holder_name", account_holder_name.as_str());
    let sign = SCHEME.sign(SignedMessage::Payout, &params, config.payout_secret());
    insert(&mut params, SIGN_FIELD, sign);
    Ok(params)
}

/// Checks the `status` envelope. A `FAILED` status is a definite rejection; anything other than `SUCCESS` is treated
/// as ambiguous.
fn check_envelope(response: &Value) -> Result<&Value, GatewayApiError> {
    match response["status"].as_str() {
        Some("SUCCESS") => Ok(&response["data"]),
        Some("FAILED") => Err(GatewayApiError::Rejected {
            code: json_str(response, "code").unwrap_or_else(|| "FAILED".to_string()),
            message: json_str(response, "message").unwrap_or_default(),
        }),
        _ => Err(GatewayApiError::OutcomeUnknown(format!("Unexpected response envelope: {response}"))),
    }
}

pub fn parse_payin_response(response: Value) -> Result<PayinSubmission, GatewayApiError> {
    let data = check_envelope(&response)?;
    let provider_order_id = json_str(data, "order_id")
        .ok_or_else(|| GatewayApiError::OutcomeUnknown("Pay-in accepted without an order_id".to_string()))?;
    let payment_url = json_str(data, "payment_url");
    Ok(PayinSubmission { provider_order_id, payment_url, raw: response })
}

pub fn parse_payout_response(response: Value) -> Result<PayoutSubmission, GatewayApiError> {
    let data = check_envelope(&response)?;
    let provider_order_id = json_str(data, "payout_id")
        .ok_or_else(|| GatewayApiError::OutcomeUnknown("Payout accepted without a payout_id".to_string()))?;
    Ok(PayoutSubmission { provider_order_id, raw: response })
}

pub fn parse_callback(config: &GatewayConfig, payload: Value) -> Result<ProviderCallback, GatewayApiError> {
    let params = params_from_json(&payload);
    if !SCHEME.verify_params(SignedMessage::ProviderCallback, &params, config.api_key.reveal()) {
        return Err(GatewayApiError::CallbackSignatureInvalid);
    }
    let order_no = json_str(&payload, "order_no")
        .ok_or_else(|| GatewayApiError::InvalidCallback("Missing order_no".to_string()))?;
    let outcome = match json_str(&payload, "status").as_deref().map(str::to_ascii_uppercase).as_deref() {
        Some("SUCCESS") => CallbackOutcome::Success,
        Some("FAILED") => CallbackOutcome::Failed,
        Some("PENDING") | Some("PROCESSING") => CallbackOutcome::Processing,
        other => return Err(GatewayApiError::InvalidCallback(format!("Unknown status {other:?}"))),
    };
    let amount = match json_str(&payload, "amount") {
        Some(a) => Some(a.parse::<Money>().map_err(|e| GatewayApiError::InvalidCallback(e.to_string()))?),
        None => None,
    };
    let provider_order_id = json_str(&payload, "provider_order_id");
    Ok(ProviderCallback { order_no, provider_order_id, amount, outcome, raw: payload })
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::ProviderType;

    fn config() -> GatewayConfig {
        GatewayConfig::new(ProviderType::BankTransfer, "https://bank.example", "APP-1", "cb-secret".into())
            .with_payout_key(Some("payout-secret".into()))
    }

    fn payout() -> PayoutRequest {
        PayoutRequest {
            order_no: "PO123".into(),
            amount: Money::from_major(2000),
            currency: "INR".into(),
            account: PayoutAccount::Bank {
                account_number: "001122334455".into(),
                ifsc_code: "SBIN0000001".into(),
                bank_name: "SBI".into(),
                account_holder_name: "A Kumar".into(),
            },
            notify_url: "https://us.example/callback/bank1".into(),
        }
    }

    #[test]
    fn payout_is_signed_with_payout_key() {
        let params = payout_params(&config(), &payout()).unwrap();
        assert_eq!(params["amount"], "2000.00");
        assert_eq!(params["merchant_id"], "APP-1");
        assert!(SCHEME.verify_params(SignedMessage::Payout, &params, "payout-secret"));
        assert!(!SCHEME.verify_params(SignedMessage::Payout, &params, "cb-secret"));
    }

    #[test]
    fn wallet_payouts_are_refused() {
        let mut req = payout();
        req.account =
            PayoutAccount::MobileWallet { wallet: "bkash".into(), phone: "017".into(), account_name: "X".into() };
        assert!(matches!(payout_params(&config(), &req), Err(GatewayApiError::UnsupportedAccount(_))));
    }

    #[test]
    fn payout_responses() {
        let ok = json!({"status": "SUCCESS", "message": "ok", "data": {"payout_id": "BT-99"}});
        assert_eq!(parse_payout_response(ok).unwrap().provider_order_id, "BT-99");
        let rejected = json!({"status": "FAILED", "message": "Invalid IFSC"});
        match parse_payout_response(rejected) {
            Err(GatewayApiError::Rejected { message, .. }) => assert_eq!(message, "Invalid IFSC"),
            other => panic!("Expected a rejection, got {other:?}"),
        }
        let weird = json!({"status": "QUEUED"});
        assert!(matches!(parse_payout_response(weird), Err(GatewayApiError::OutcomeUnknown(_))));
    }

    #[test]
    fn callbacks_are_verified() {
        let mut params = SignedParams::new();
        params.insert("order_no".into(), "PO123".into());
        params.insert("provider_order_id".into(), "BT-99".into());
        params.insert("amount".into(), "2000.00".into());
        params.insert("status".into(), "SUCCESS".into());
        let sign = SCHEME.sign(SignedMessage::ProviderCallback, &params, "cb-secret");
        let mut payload = serde_json::to_value(&params).unwrap();
        payload["sign"] = Value::String(sign.to_lowercase());
        let cb = parse_callback(&config(), payload.clone()).unwrap();
        assert_eq!(cb.order_no, "PO123");
        assert_eq!(cb.outcome, CallbackOutcome::Success);
        assert_eq!(cb.amount, Some(Money::from_major(2000)));

        payload["status"] = Value::String("FAILED".into());
        assert!(matches!(parse_callback(&config(), payload), Err(GatewayApiError::CallbackSignatureInvalid)));
    }
}
