use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settlement_engine::db_types::{Merchant, OrderNo, OrderStatusType, Transaction, TransactionType};
use sg_common::FeeRate;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// The reply to a successful `/payin` or `/payout` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_no: OrderNo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

impl From<Transaction> for OrderCreated {
    fn from(t: Transaction) -> Self {
        Self { order_no: t.order_no, payment_url: t.payment_url }
    }
}

/// What a merchant sees when it queries one of its orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_no: OrderNo,
    pub merchant_order_no: String,
    pub transaction_type: TransactionType,
    pub status: OrderStatusType,
    pub amount: String,
    pub fee: String,
    pub net_amount: String,
    pub currency: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Transaction> for OrderStatusResponse {
    fn from(t: Transaction) -> Self {
        Self {
            order_no: t.order_no,
            merchant_order_no: t.merchant_order_no,
            transaction_type: t.transaction_type,
            status: t.status,
            amount: t.amount.to_string(),
            fee: t.fee.to_string(),
            net_amount: t.net_amount.to_string(),
            currency: t.currency,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutAction {
    Approve,
    Reject,
    /// Manually mark a dispatched payout as paid.
    Confirm,
    /// Manually mark a dispatched payout as failed, releasing its funds.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessPayoutRequest {
    /// Our order number.
    pub transaction_id: String,
    pub action: PayoutAction,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditRequest {
    /// The merchant's account number.
    pub merchant_id: String,
    /// A decimal amount, e.g. `"500.00"`.
    pub amount: String,
    /// The admin's reference for this top-up, e.g. the bank slip number. Each reference is credited once.
    pub reference: String,
}

/// A merchant as shown to admins. Keys are never included. Balances are decimal strings, while the amounts in
/// `recent_transactions` are in minor units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantSummary {
    pub account_number: String,
    pub name: String,
    pub balance: String,
    pub frozen_balance: String,
    pub total_funds: String,
    pub payin_fee: FeeRate,
    pub payout_fee: FeeRate,
    pub is_active: bool,
    pub recent_transactions: Vec<Transaction>,
}

impl MerchantSummary {
    pub fn new(merchant: Merchant, recent_transactions: Vec<Transaction>) -> Self {
        Self {
            total_funds: merchant.total_funds().to_string(),
            account_number: merchant.account_number,
            name: merchant.name,
            balance: merchant.balance.to_string(),
            frozen_balance: merchant.frozen_balance.to_string(),
            payin_fee: merchant.payin_fee,
            payout_fee: merchant.payout_fee,
            is_active: merchant.is_active,
            recent_transactions,
        }
    }
}
