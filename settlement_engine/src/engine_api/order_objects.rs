//! Typed views over the raw, signed parameter maps that merchants send.
//!
//! Merchants post flat `key=value` maps (form or JSON). The map is verified as-is, since both signature schemes
//! depend on exactly what was sent. Only after verification is it parsed into one of the request types here.
use serde::{Deserialize, Serialize};
use sg_common::{Money, SignatureScheme, SignedParams};

use crate::{db_types::Destination, engine_api::errors::SettlementError};

pub const DEFAULT_USDT_NETWORK: &str = "TRC20";

/// A signed merchant request, before we know which merchant sent it.
#[derive(Debug, Clone)]
pub struct SignedRequest<'a> {
    pub params: &'a SignedParams,
}

impl<'a> SignedRequest<'a> {
    pub fn new(params: &'a SignedParams) -> Self {
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&'a str, SettlementError> {
        self.get(key).ok_or_else(|| SettlementError::InvalidRequest(format!("Missing field: {key}")))
    }

    pub fn merchant_account(&self) -> Result<&'a str, SettlementError> {
        self.require("merchant_id")
    }

    /// The merchant's own order reference. `transaction_id` is accepted as an alias, and is the name the ordered
    /// signature scheme uses. A request naming two different references is refused, since a signature may only cover
    /// one of them.
    pub fn merchant_order_no(&self) -> Result<&'a str, SettlementError> {
        match (self.get("merchant_order_no"), self.get("transaction_id")) {
            (Some(a), Some(b)) if a != b => Err(SettlementError::InvalidRequest(
                "merchant_order_no and transaction_id name different orders".to_string(),
            )),
            (Some(r), _) | (None, Some(r)) => Ok(r),
            (None, None) => Err(SettlementError::InvalidRequest("Missing field: merchant_order_no".to_string())),
        }
    }

    /// Makes sure the order reference is part of what `scheme` signs. The ordered scheme only covers `transaction_id`,
    /// so a request relying on that scheme must carry its reference there.
    pub fn require_signed_reference(&self, scheme: SignatureScheme) -> Result<(), SettlementError> {
        if scheme == SignatureScheme::OrderedConcat && self.get("transaction_id").is_none() {
            let message = format!("Missing field: transaction_id (required by {scheme})");
            return Err(SettlementError::InvalidRequest(message));
        }
        self.merchant_order_no().map(|_| ())
    }

    pub fn amount(&self) -> Result<Money, SettlementError> {
        let raw = self.require("amount")?;
        let amount = raw.parse::<Money>().map_err(|e| SettlementError::InvalidRequest(e.to_string()))?;
        if !amount.is_positive() {
            return Err(SettlementError::InvalidRequest("The amount must be positive".to_string()));
        }
        Ok(amount)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayinRequest {
    pub merchant_account: String,
    pub merchant_order_no: String,
    pub amount: Money,
    pub callback_url: String,
    pub extra: Option<String>,
}

impl TryFrom<SignedRequest<'_>> for PayinRequest {
    type Error = SettlementError;

    fn try_from(req: SignedRequest<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            merchant_account: req.merchant_account()?.to_string(),
            merchant_order_no: req.merchant_order_no()?.to_string(),
            amount: req.amount()?,
            callback_url: req.get("callback_url").unwrap_or_default().to_string(),
            extra: req.get("extra").map(String::from),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub merchant_account: String,
    pub merchant_order_no: String,
    pub amount: Money,
    pub callback_url: String,
    pub destination: Destination,
    pub extra: Option<String>,
}

impl TryFrom<SignedRequest<'_>> for PayoutRequest {
    type Error = SettlementError;

    fn try_from(req: SignedRequest<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            merchant_account: req.merchant_account()?.to_string(),
            merchant_order_no: req.merchant_order_no()?.to_string(),
            amount: req.amount()?,
            callback_url: req.get("callback_url").unwrap_or_default().to_string(),
            destination: destination_from(&req)?,
            extra: req.get("extra").map(String::from),
        })
    }
}

/// Works out the payout destination. Exactly one of the three shapes must be present:
///
/// * bank: `account_number`, `ifsc_code`, `bank_name`, `account_holder_name`
/// * mobile wallet: `phone`, `wallet`, `account_name`
/// * USDT: `usdt_address`, optional `network` (defaults to TRC20)
fn destination_from(req: &SignedRequest<'_>) -> Result<Destination, SettlementError> {
    let mut found = Vec::with_capacity(1);
    if req.get("account_number").is_some() {
        found.push(Destination::Bank {
            account_number: req.require("account_number")?.to_string(),
            ifsc_code: req.require("ifsc_code")?.to_string(),
            bank_name: req.get("bank_name").unwrap_or_default().to_string(),
            account_holder_name: req.require("account_holder_name")?.to_string(),
        });
    }
    if req.get("phone").is_some() {
        found.push(Destination::MobileWallet {
            wallet: req.require("wallet")?.to_string(),
            phone: req.require("phone")?.to_string(),
            account_name: req.get("account_name").unwrap_or_default().to_string(),
        });
    }
    if req.get("usdt_address").is_some() {
        found.push(Destination::Usdt {
            network: req.get("network").unwrap_or(DEFAULT_USDT_NETWORK).to_string(),
            address: req.require("usdt_address")?.to_string(),
        });
    }
    match found.len() {
        0 => Err(SettlementError::InvalidRequest("No payout destination given".to_string())),
        1 => Ok(found.remove(0)),
        _ => Err(SettlementError::InvalidRequest("More than one payout destination given".to_string())),
    }
}
