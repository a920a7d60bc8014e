use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sg_common::{Money, SignatureScheme};

//--------------------------------------     ProviderType     ---------------------------------------------------------
/// The upstream provider API families we can talk to. A gateway profile's `gateway_type` is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Form-encoded INR bank transfer API (IMPS/NEFT). Signs with the ordered-concatenation scheme, amounts in major
    /// units with two decimals.
    BankTransfer,
    /// JSON API covering mobile wallets, bank accounts and USDT. Signs with the sorted key=value scheme, amounts in
    /// minor units.
    UnifiedApi,
}

impl ProviderType {
    pub fn signature_scheme(&self) -> SignatureScheme {
        match self {
            ProviderType::BankTransfer => SignatureScheme::OrderedConcat,
            ProviderType::UnifiedApi => SignatureScheme::SortedKeyValue,
        }
    }

    /// Whether this provider can pay out to the given kind of account in the given currency.
    pub fn supports_account(&self, currency: &str, kind: AccountKind) -> bool {
        use AccountKind::*;
        match (self, currency.to_ascii_uppercase().as_str()) {
            (ProviderType::BankTransfer, "INR") => kind == Bank,
            (ProviderType::BankTransfer, _) => false,
            (ProviderType::UnifiedApi, "INR") => kind == Bank,
            (ProviderType::UnifiedApi, "BDT" | "PKR") => kind == MobileWallet,
            (ProviderType::UnifiedApi, "USDT") => kind == Usdt,
            (ProviderType::UnifiedApi, _) => false,
        }
    }
}

impl Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderType::BankTransfer => write!(f, "bank_transfer"),
            ProviderType::UnifiedApi => write!(f, "unified_api"),
        }
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(Self::BankTransfer),
            "unified_api" => Ok(Self::UnifiedApi),
            s => Err(format!("Unknown provider type: {s}")),
        }
    }
}

//--------------------------------------     PayoutAccount    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    Bank,
    MobileWallet,
    Usdt,
}

/// Where a payout should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PayoutAccount {
    Bank { account_number: String, ifsc_code: String, bank_name: String, account_holder_name: String },
    MobileWallet { wallet: String, phone: String, account_name: String },
    Usdt { network: String, address: String },
}

impl PayoutAccount {
    pub fn kind(&self) -> AccountKind {
        match self {
            PayoutAccount::Bank { .. } => AccountKind::Bank,
            PayoutAccount::MobileWallet { .. } => AccountKind::MobileWallet,
            PayoutAccount::Usdt { .. } => AccountKind::Usdt,
        }
    }
}

//--------------------------------------       Requests       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct PayinRequest {
    /// Our order number. Providers echo it back in callbacks.
    pub order_no: String,
    pub amount: Money,
    pub currency: String,
    /// Where the provider should send the asynchronous result.
    pub notify_url: String,
}

#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub order_no: String,
    pub amount: Money,
    pub currency: String,
    pub account: PayoutAccount,
    pub notify_url: String,
}

//--------------------------------------      Responses       ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayinSubmission {
    pub provider_order_id: String,
    pub payment_url: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSubmission {
    pub provider_order_id: String,
    pub raw: Value,
}

//--------------------------------------      Callbacks       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackOutcome {
    Success,
    Failed,
    /// An intermediate notification. Nothing to do but acknowledge it.
    Processing,
}

impl Display for CallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackOutcome::Success => write!(f, "success"),
            CallbackOutcome::Failed => write!(f, "failed"),
            CallbackOutcome::Processing => write!(f, "processing"),
        }
    }
}

/// A verified provider callback, translated into our vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCallback {
    pub order_no: String,
    pub provider_order_id: Option<String>,
    pub amount: Option<Money>,
    pub outcome: CallbackOutcome,
    pub raw: Value,
}
