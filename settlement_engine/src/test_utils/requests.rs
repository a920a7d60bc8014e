//! Signed merchant requests, built the way a merchant integration would build them.
use sg_common::{SignedMessage, SignedParams, SIGN_FIELD};

use crate::db_types::{Merchant, PaymentGateway};

pub fn params(pairs: &[(&str, &str)]) -> SignedParams {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// Adds a `sign` field computed with the gateway's scheme.
pub fn sign(gateway: &PaymentGateway, message: SignedMessage, mut params: SignedParams, secret: &str) -> SignedParams {
    let signature = gateway.gateway_type.signature_scheme().sign(message, &params, secret);
    params.insert(SIGN_FIELD.to_string(), signature);
    params
}

pub fn payin_params(merchant: &Merchant, gateway: &PaymentGateway, order_no: &str, amount: &str) -> SignedParams {
    let p = params(&[
        ("merchant_id", merchant.account_number.as_str()),
        ("transaction_id", order_no),
        ("amount", amount),
        ("callback_url", "https://merchant.example.com/notify"),
    ]);
    sign(gateway, SignedMessage::Payin, p, merchant.api_key.reveal())
}

pub fn bank_payout_params(merchant: &Merchant, gateway: &PaymentGateway, order_no: &str, amount: &str) -> SignedParams {
    let p = params(&[
        ("merchant_id", merchant.account_number.as_str()),
        ("transaction_id", order_no),
        ("amount", amount),
        ("callback_url", "https://merchant.example.com/notify"),
        ("account_number", "001234567890"),
        ("ifsc_code", "HDFC0001234"),
        ("bank_name", "HDFC Bank"),
        ("account_holder_name", "Asha Rao"),
    ]);
    sign(gateway, SignedMessage::Payout, p, merchant.payout_secret())
}

pub fn order_query_params(merchant: &Merchant, gateway: &PaymentGateway, order_no: &str) -> SignedParams {
    let p = params(&[("merchant_id", merchant.account_number.as_str()), ("transaction_id", order_no)]);
    sign(gateway, SignedMessage::OrderQuery, p, merchant.api_key.reveal())
}
