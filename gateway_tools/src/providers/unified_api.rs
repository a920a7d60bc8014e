//! JSON provider covering bank accounts, mobile wallets and USDT.
//!
//! Requests and responses are JSON. Amounts are integers in minor units. Signatures use
//! [`SignatureScheme::SortedKeyValue`] over every top-level field.
//!
//! Responses look like `{"code": 0, "msg": "...", "data": {...}}`, where any non-zero code is a rejection.
//! Transfer and callback states are numeric: `1` processing, `2` success, `3` failed.
use serde_json::{Map, Value};
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

pub const PAYIN_PATH: &str = "/api/pay/create";
pub const PAYOUT_PATH: &str = "/api/transfer/create";

const SCHEME: SignatureScheme = SignatureScheme::SortedKeyValue;

const STATE_PROCESSING: &str = "1";
const STATE_SUCCESS: &str = "2";
const STATE_FAILED: &str = "3";

fn signed_body(mut params: SignedParams, secret: &str) -> Value {
    // Sorted-scheme signatures ignore the message kind.
    let sign = SCHEME.sign(SignedMessage::Payin, &params, secret);
    params.insert(SIGN_FIELD.to_string(), sign);
    let body = params.into_iter().map(|(k, v)| (k, Value::String(v))).collect::<Map<String, Value>>();
    Value::Object(body)
}

fn common_params(
    config: &GatewayConfig,
    order_no: &str,
    amount: Money,
    currency: &str,
    notify_url: &str,
    now_ms: i64,
) -> SignedParams {
    let mut params = SignedParams::new();
    params.insert("appId".into(), config.app_id.clone());
    params.insert("mchOrderNo".into(), order_no.to_string());
    params.insert("amount".into(), amount.value().to_string());
    params.insert("currency".into(), currency.to_string());
    params.insert("notifyUrl".into(), notify_url.to_string());
    params.insert("reqTime".into(), now_ms.to_string());
    params
}

pub fn payin_body(config: &GatewayConfig, req: &PayinRequest, now_ms: i64) -> Value {
    let mut params = common_params(config, &req.order_no, req.amount, &req.currency, &req.notify_url, now_ms);
    params.insert("wayCode".into(), config.trade_type.clone());
    signed_body(params, config.api_key.reveal())
}

pub fn payout_body(config: &GatewayConfig, req: &PayoutRequest, now_ms: i64) -> Value {
    let mut params = common_params(config, &req.order_no, req.amount, &req.currency, &req.notify_url, now_ms);
    let (account_type, account_no, account_name, bank_code) = match &req.account {
        PayoutAccount::Bank { account_number, ifsc_code, account_holder_name, .. } => {
            ("BANK", account_number, account_holder_name.as_str(), ifsc_code.as_str())
        },
        PayoutAccount::MobileWallet { wallet, phone, account_name } => {
            ("WALLET", phone, account_name.as_str(), wallet.as_str())
        },
        PayoutAccount::Usdt { network, address } => ("USDT", address, "", network.as_str()),
    };
    params.insert("accountType".into(), account_type.to_string());
    params.insert("accountNo".into(), account_no.clone());
    params.insert("accountName".into(), account_name.to_string());
    params.insert("bankCode".into(), bank_code.to_string());
    if let PayoutAccount::Bank { bank_name, .. } = &req.account {
        params.insert("bankName".into(), bank_name.clone());
    }
    signed_body(params, config.payout_secret())
}

fn check_envelope(response: &Value) -> Result<&Value, GatewayApiError> {
    match response["code"].as_i64() {
        Some(0) => Ok(&response["data"]),
        Some(code) => Err(GatewayApiError::Rejected {
            code: code.to_string(),
            message: json_str(response, "msg").unwrap_or_default(),
        }),
        None => Err(GatewayApiError::OutcomeUnknown(format!("Unexpected response envelope: {response}"))),
    }
}

pub fn parse_payin_response(response: Value) -> Result<PayinSubmission, GatewayApiError> {
    let data = check_envelope(&response)?;
    let provider_order_id = json_str(data, "payOrderId")
        .ok_or_else(|| GatewayApiError::OutcomeUnknown("Pay-in accepted without a payOrderId".to_string()))?;
    let payment_url = json_str(data, "payUrl");
    Ok(PayinSubmission { provider_order_id, payment_url, raw: response })
}

pub fn parse_payout_response(response: Value) -> Result<PayoutSubmission, GatewayApiError> {
    let data = check_envelope(&response)?;
    if json_str(data, "state").as_deref() == Some(STATE_FAILED) {
        return Err(GatewayApiError::Rejected {
            code: STATE_FAILED.to_string(),
            message: json_str(data, "errMsg").unwrap_or_else(|| "Transfer failed".to_string()),
        });
    }
    let provider_order_id = json_str(data, "transferId")
        .ok_or_else(|| GatewayApiError::OutcomeUnknown("Transfer accepted without a transferId".to_string()))?;
    Ok(PayoutSubmission { provider_order_id, raw: response })
}

pub fn parse_callback(config: &GatewayConfig, payload: Value) -> Result<ProviderCallback, GatewayApiError> {
    let params = params_from_json(&payload);
    if !SCHEME.verify_params(SignedMessage::ProviderCallback, &params, config.api_key.reveal()) {
        return Err(GatewayApiError::CallbackSignatureInvalid);
    }
    let order_no = json_str(&payload, "mchOrderNo")
        .ok_or_else(|| GatewayApiError::InvalidCallback("Missing mchOrderNo".to_string()))?;
    let outcome = match json_str(&payload, "state").as_deref() {
        Some(STATE_SUCCESS) => CallbackOutcome::Success,
        Some(STATE_FAILED) => CallbackOutcome::Failed,
        Some("0") | Some(STATE_PROCESSING) => CallbackOutcome::Processing,
        other => return Err(GatewayApiError::InvalidCallback(format!("Unknown state {other:?}"))),
    };
    let amount = match json_str(&payload, "amount") {
        Some(a) => {
            let minor = a.parse::<i64>().map_err(|e| GatewayApiError::InvalidCallback(e.to_string()))?;
            Some(Money::from_minor(minor))
        },
        None => None,
    };
    let provider_order_id = json_str(&payload, "platOrderNo");
    Ok(ProviderCallback { order_no, provider_order_id, amount, outcome, raw: payload })
}
