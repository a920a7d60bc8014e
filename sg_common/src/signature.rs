//! Shared-secret request signatures.
//!
//! Every request that moves money, whether it comes from a merchant or from an upstream settlement provider, carries a
//! `sign` field. The signature is a SHA-256 digest over a canonical encoding of the request parameters followed by a
//! shared secret. Two canonical encodings are in use across provider types, and a gateway profile selects exactly one
//! of them:
//!
//! * [`SignatureScheme::OrderedConcat`]: the values of a fixed, message-specific list of fields are concatenated in
//!   that order (not sorted), and the secret is appended. Absent fields contribute an empty string.
//! * [`SignatureScheme::SortedKeyValue`]: empty fields and the `sign` field are dropped, the rest are sorted by key in
//!   byte order and joined as `key=value` pairs with `&`. Then `&key=<secret>` is appended.
//!
//! Digests are emitted as uppercase hex and compared case-insensitively, since providers are inconsistent about case.
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The name of the parameter holding the signature itself.
pub const SIGN_FIELD: &str = "sign";

/// Request parameters, keyed by field name. A `BTreeMap` keeps keys in byte order, which is the order the sorted
/// scheme needs.
pub type SignedParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignatureScheme {
    OrderedConcat,
    SortedKeyValue,
}

/// The kinds of message that get signed. Only the ordered scheme cares about the message kind, since each kind has
/// its own field sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedMessage {
    Payin,
    Payout,
    OrderQuery,
    ProviderCallback,
    MerchantNotification,
}

const PAYIN_FIELDS: &[&str] = &["amount", "callback_url", "merchant_id", "transaction_id"];
const PAYOUT_FIELDS: &[&str] = &[
    "account_number",
    "amount",
    "bank_name",
    "callback_url",
    "ifsc_code",
    "merchant_id",
    "account_holder_name",
    "transaction_id",
];
const ORDER_QUERY_FIELDS: &[&str] = &["merchant_id", "transaction_id"];
const PROVIDER_CALLBACK_FIELDS: &[&str] = &["amount", "order_no", "provider_order_id", "status"];
const MERCHANT_NOTIFICATION_FIELDS: &[&str] = &["amount", "merchantOrder", "orderNo", "status", "timestamp"];

impl SignedMessage {
    pub fn ordered_fields(&self) -> &'static [&'static str] {
        match self {
            SignedMessage::Payin => PAYIN_FIELDS,
            SignedMessage::Payout => PAYOUT_FIELDS,
            SignedMessage::OrderQuery => ORDER_QUERY_FIELDS,
            SignedMessage::ProviderCallback => PROVIDER_CALLBACK_FIELDS,
            SignedMessage::MerchantNotification => MERCHANT_NOTIFICATION_FIELDS,
        }
    }
}

impl SignatureScheme {
    /// Builds the exact string that gets hashed, secret included.
    pub fn canonicalize(&self, message: SignedMessage, params: &SignedParams, secret: &str) -> String {
        match self {
            SignatureScheme::OrderedConcat => {
                let mut result = message
                    .ordered_fields()
                    .iter()
                    .map(|&f| params.get(f).map(String::as_str).unwrap_or_default())
                    .collect::<String>();
                result.push_str(secret);
                result
            },
            SignatureScheme::SortedKeyValue => {
                let mut pairs = params
                    .iter()
                    .filter(|(k, v)| k.as_str() != SIGN_FIELD && !v.is_empty())
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<String>>();
                pairs.push(format!("key={secret}"));
                pairs.join("&")
            },
        }
    }

    /// Calculates the uppercase hex signature for the given parameters.
    pub fn sign(&self, message: SignedMessage, params: &SignedParams, secret: &str) -> String {
        let canonical = self.canonicalize(message, params, secret);
        hex::encode_upper(Sha256::digest(canonical.as_bytes()))
    }

    /// Recomputes the signature and compares it with `signature`, ignoring case. Empty signatures never verify.
    pub fn verify(&self, message: SignedMessage, params: &SignedParams, secret: &str, signature: &str) -> bool {
        let signature = signature.trim();
        if signature.is_empty() {
            return false;
        }
        let expected = self.sign(message, params, secret);
        expected.eq_ignore_ascii_case(signature)
    }

    /// As [`Self::verify`], taking the signature from the `sign` entry of `params`.
    pub fn verify_params(&self, message: SignedMessage, params: &SignedParams, secret: &str) -> bool {
        match params.get(SIGN_FIELD) {
            Some(signature) => self.verify(message, params, secret, signature),
            None => false,
        }
    }
}

impl Display for SignatureScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureScheme::OrderedConcat => write!(f, "ordered_concat"),
            SignatureScheme::SortedKeyValue => write!(f, "sorted_key_value"),
        }
    }
}

impl FromStr for SignatureScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ordered_concat" => Ok(Self::OrderedConcat),
            "sorted_key_value" => Ok(Self::SortedKeyValue),
            s => Err(format!("Unknown signature scheme: {s}")),
        }
    }
}
