use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sg_common::{FeeRate, Money, Secret, SignatureScheme};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------    TransactionType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in from an end customer, credited to the merchant once the provider confirms it.
    Payin,
    /// Money leaving the merchant balance towards a beneficiary account.
    Payout,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionType::Payin => write!(f, "payin"),
            TransactionType::Payout => write!(f, "payout"),
        }
    }
}

//--------------------------------------    OrderStatusType    ---------------------------------------------------------
/// Persisted order states. The transient `created` state never reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// Waiting for a provider callback (and, for payouts, possibly admin approval).
    Pending,
    /// Final. Pay-ins have been credited; payout funds have left the system.
    Success,
    /// Final. Nothing was credited, or frozen payout funds were released.
    Failed,
}

impl OrderStatusType {
    pub fn is_final(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::Success => write!(f, "success"),
            OrderStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

/// The two ways a pending order can end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinalOutcome {
    Success,
    Failed,
}

impl From<FinalOutcome> for OrderStatusType {
    fn from(value: FinalOutcome) -> Self {
        match value {
            FinalOutcome::Success => OrderStatusType::Success,
            FinalOutcome::Failed => OrderStatusType::Failed,
        }
    }
}

//--------------------------------------        OrderNo        ---------------------------------------------------------
/// The system-generated order reference. Globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderNo(pub String);

impl OrderNo {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderNo {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderNo {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderNo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------      GatewayType      ---------------------------------------------------------
/// The provider API family a gateway profile talks to. It decides the signature scheme for merchant requests,
/// provider requests and provider callbacks alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GatewayType {
    BankTransfer,
    UnifiedApi,
}

impl GatewayType {
    pub fn signature_scheme(&self) -> SignatureScheme {
        match self {
            GatewayType::BankTransfer => SignatureScheme::OrderedConcat,
            GatewayType::UnifiedApi => SignatureScheme::SortedKeyValue,
        }
    }
}

impl Display for GatewayType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayType::BankTransfer => write!(f, "bank_transfer"),
            GatewayType::UnifiedApi => write!(f, "unified_api"),
        }
    }
}

impl FromStr for GatewayType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank_transfer" => Ok(Self::BankTransfer),
            "unified_api" => Ok(Self::UnifiedApi),
            s => Err(ConversionError(format!("Invalid gateway type: {s}"))),
        }
    }
}

//--------------------------------------     PaymentGateway    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentGateway {
    pub id: i64,
    /// Unique code. Also the last segment of the provider callback path.
    pub code: String,
    pub gateway_type: GatewayType,
    pub base_url: String,
    pub app_id: String,
    #[sqlx(try_from = "String")]
    #[serde(skip_serializing, default)]
    pub api_key: Secret<String>,
    /// Empty when the provider signs everything with `api_key`.
    #[sqlx(try_from = "String")]
    #[serde(skip_serializing, default)]
    pub payout_key: Secret<String>,
    pub currency: String,
    pub trade_type: String,
    pub min_withdrawal: Money,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPaymentGateway {
    pub code: String,
    pub gateway_type: GatewayType,
    pub base_url: String,
    pub app_id: String,
    pub api_key: Secret<String>,
    pub payout_key: Option<Secret<String>>,
    pub currency: String,
    pub trade_type: String,
    pub min_withdrawal: Money,
}

impl NewPaymentGateway {
    pub fn new(code: &str, gateway_type: GatewayType, base_url: &str, app_id: &str, api_key: &str) -> Self {
        Self {
            code: code.to_string(),
            gateway_type,
            base_url: base_url.to_string(),
            app_id: app_id.to_string(),
            api_key: Secret::from(api_key),
            payout_key: None,
            currency: "INR".to_string(),
            trade_type: String::new(),
            min_withdrawal: Money::default(),
        }
    }

    pub fn with_payout_key(mut self, key: &str) -> Self {
        self.payout_key = Some(Secret::from(key));
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_ascii_uppercase();
        self
    }

    pub fn with_trade_type(mut self, trade_type: &str) -> Self {
        self.trade_type = trade_type.to_string();
        self
    }

    pub fn with_min_withdrawal(mut self, min: Money) -> Self {
        self.min_withdrawal = min;
        self
    }
}

//--------------------------------------        Merchant       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Merchant {
    pub id: i64,
    /// The public merchant identifier. Merchants send this as `merchant_id`.
    pub account_number: String,
    pub name: String,
    pub balance: Money,
    pub frozen_balance: Money,
    pub payin_fee: FeeRate,
    pub payout_fee: FeeRate,
    #[sqlx(try_from = "String")]
    #[serde(skip_serializing, default)]
    pub api_key: Secret<String>,
    #[sqlx(try_from = "String")]
    #[serde(skip_serializing, default)]
    pub payout_key: Secret<String>,
    pub gateway_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Merchant {
    /// The secret that signs payout requests. Falls back to the API key for merchants with a single shared secret.
    pub fn payout_secret(&self) -> &str {
        if self.payout_key.is_empty() {
            self.api_key.reveal()
        } else {
            self.payout_key.reveal()
        }
    }

    pub fn total_funds(&self) -> Money {
        self.balance + self.frozen_balance
    }
}

#[derive(Debug, Clone)]
pub struct NewMerchant {
    pub account_number: String,
    pub name: String,
    pub api_key: Secret<String>,
    pub payout_key: Option<Secret<String>>,
    pub gateway_id: i64,
    pub payin_fee: Option<FeeRate>,
    pub payout_fee: Option<FeeRate>,
}

impl NewMerchant {
    pub fn new(account_number: &str, name: &str, api_key: &str, gateway_id: i64) -> Self {
        Self {
            account_number: account_number.to_string(),
            name: name.to_string(),
            api_key: Secret::from(api_key),
            payout_key: None,
            gateway_id,
            payin_fee: None,
            payout_fee: None,
        }
    }

    pub fn with_payout_key(mut self, key: &str) -> Self {
        self.payout_key = Some(Secret::from(key));
        self
    }

    pub fn with_fees(mut self, payin_fee: FeeRate, payout_fee: FeeRate) -> Self {
        self.payin_fee = Some(payin_fee);
        self.payout_fee = Some(payout_fee);
        self
    }
}

//--------------------------------------      Destination      ---------------------------------------------------------
/// Where a payout is sent. Exactly one shape per order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Bank { account_number: String, ifsc_code: String, bank_name: String, account_holder_name: String },
    MobileWallet { wallet: String, phone: String, account_name: String },
    Usdt { network: String, address: String },
}

impl Destination {
    pub fn kind(&self) -> &'static str {
        match self {
            Destination::Bank { .. } => "bank",
            Destination::MobileWallet { .. } => "mobile_wallet",
            Destination::Usdt { .. } => "usdt",
        }
    }
}

//--------------------------------------    SettlementEvent    ---------------------------------------------------------
/// One entry in an order's append-only `callback_data` log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SettlementEvent {
    /// An admin approved the payout and it was claimed for dispatch. Only ever recorded once per order.
    Approved { at: DateTime<Utc> },
    /// The provider accepted the order.
    SubmittedToUpstream { at: DateTime<Utc>, provider_order_id: String, response: Value },
    /// The provider definitely did not accept the order.
    SubmissionFailed { at: DateTime<Utc>, reason: String },
    /// We do not know whether the provider accepted the order. Funds stay frozen until a callback or an admin decides.
    SubmissionOutcomeUnknown { at: DateTime<Utc>, reason: String },
    /// An admin rejected the payout before dispatch.
    Rejected { at: DateTime<Utc>, reason: String },
    /// A verified provider callback was received.
    CallbackReceived { at: DateTime<Utc>, outcome: String, payload: Value },
    /// An admin resolved a dispatched payout by hand.
    ManuallyResolved { at: DateTime<Utc>, outcome: FinalOutcome, reason: String },
    /// A pay-in was never paid.
    Expired { at: DateTime<Utc> },
}

impl SettlementEvent {
    pub fn approved() -> Self {
        Self::Approved { at: Utc::now() }
    }

    pub fn submitted(provider_order_id: &str, response: Value) -> Self {
        Self::SubmittedToUpstream { at: Utc::now(), provider_order_id: provider_order_id.to_string(), response }
    }

    pub fn submission_failed(reason: &str) -> Self {
        Self::SubmissionFailed { at: Utc::now(), reason: reason.to_string() }
    }

    pub fn outcome_unknown(reason: &str) -> Self {
        Self::SubmissionOutcomeUnknown { at: Utc::now(), reason: reason.to_string() }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected { at: Utc::now(), reason: reason.to_string() }
    }

    pub fn callback(outcome: &str, payload: Value) -> Self {
        Self::CallbackReceived { at: Utc::now(), outcome: outcome.to_string(), payload }
    }

    pub fn manually_resolved(outcome: FinalOutcome, reason: &str) -> Self {
        Self::ManuallyResolved { at: Utc::now(), outcome, reason: reason.to_string() }
    }

    pub fn expired() -> Self {
        Self::Expired { at: Utc::now() }
    }
}

//--------------------------------------      Transaction      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub order_no: OrderNo,
    pub merchant_id: i64,
    pub merchant_order_no: String,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub fee: Money,
    pub net_amount: Money,
    pub currency: String,
    pub status: OrderStatusType,
    pub destination: Option<Json<Destination>>,
    pub callback_url: String,
    pub gateway_id: i64,
    pub provider_order_id: Option<String>,
    pub payment_url: Option<String>,
    pub callback_data: Json<Vec<SettlementEvent>>,
    pub extra: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn events(&self) -> &[SettlementEvent] {
        self.callback_data.0.as_slice()
    }

    pub fn destination(&self) -> Option<&Destination> {
        self.destination.as_ref().map(|d| &d.0)
    }

    /// True once the payout has been claimed for dispatch to the provider.
    pub fn is_dispatched(&self) -> bool {
        self.approved_at.is_some()
    }

    pub fn is_payout(&self) -> bool {
        self.transaction_type == TransactionType::Payout
    }
}

//--------------------------------------    NewTransaction     ---------------------------------------------------------
/// A fully validated order, ready to be stored. Fees have already been fixed.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub order_no: OrderNo,
    pub merchant_id: i64,
    pub merchant_order_no: String,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub fee: Money,
    pub net_amount: Money,
    pub currency: String,
    pub destination: Option<Destination>,
    pub callback_url: String,
    pub gateway_id: i64,
    pub extra: Option<String>,
}
