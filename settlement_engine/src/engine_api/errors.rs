use sg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{OrderNo, OrderStatusType},
    traits::{MerchantApiError, SettlementDbError},
};

/// Everything that can go wrong in a settlement flow. Messages are safe to show to the caller: they never contain
/// secrets or expected signatures.
#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Insufficient balance. Available: {available}, requested: {requested}")]
    InsufficientBalance { available: Money, requested: Money },
    #[error("Duplicate merchant order number. The existing order is {0}")]
    DuplicateOrder(OrderNo),
    #[error("Merchant {0} is inactive")]
    MerchantInactive(String),
    #[error("Unknown merchant {0}")]
    UnknownMerchant(String),
    #[error("Amount {amount} is below the minimum of {minimum}")]
    BelowMinimumAmount { amount: Money, minimum: Money },
    #[error("Order {0} has already been dispatched to the provider")]
    AlreadyProcessing(OrderNo),
    #[error("The provider did not accept order {order_no}. {reason}")]
    UpstreamSubmissionFailed { order_no: OrderNo, reason: String },
    #[error("The provider did not confirm order {order_no} in time. The order stays pending. {reason}")]
    UpstreamTimeout { order_no: OrderNo, reason: String },
    #[error("The callback signature is invalid")]
    CallbackSignatureInvalid,
    #[error("Order {0} does not exist")]
    OrderNotFound(String),
    #[error("Order {0} is already {1}")]
    OrderAlreadyFinalized(OrderNo, OrderStatusType),
    #[error("Order {0} is not a payout")]
    NotAPayout(OrderNo),
    #[error("Credit reference {0} has already been used")]
    DuplicateCredit(String),
    #[error("Invalid request. {0}")]
    InvalidRequest(String),
    #[error("Gateway unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<SettlementDbError> for SettlementError {
    fn from(e: SettlementDbError) -> Self {
        match e {
            SettlementDbError::MerchantError(e) => e.into(),
            SettlementDbError::MerchantNotFound(id) => Self::UnknownMerchant(format!("#{id}")),
            SettlementDbError::InsufficientBalance { available, requested } => {
                Self::InsufficientBalance { available, requested }
            },
            SettlementDbError::OrderNotFound(order_no) => Self::OrderNotFound(order_no.to_string()),
            SettlementDbError::NotAPayout(order_no) => Self::NotAPayout(order_no),
            SettlementDbError::AlreadyProcessing(order_no) => Self::AlreadyProcessing(order_no),
            SettlementDbError::OrderAlreadyFinalized(order_no, status) => Self::OrderAlreadyFinalized(order_no, status),
            SettlementDbError::DuplicateCredit(reference) => Self::DuplicateCredit(reference),
            e @ (SettlementDbError::DatabaseError(_)
            | SettlementDbError::FrozenBalanceTooLow { .. }
            | SettlementDbError::EventEncodingError(_)) => Self::DatabaseError(e.to_string()),
        }
    }
}

impl From<MerchantApiError> for SettlementError {
    fn from(e: MerchantApiError) -> Self {
        match e {
            MerchantApiError::DatabaseError(s) => Self::DatabaseError(s),
            MerchantApiError::MerchantNotFound(account) => Self::UnknownMerchant(account),
            MerchantApiError::GatewayNotFound(code) => {
                Self::GatewayUnavailable(format!("Gateway {code} does not exist"))
            },
            MerchantApiError::AlreadyExists(s) => Self::InvalidRequest(format!("Record already exists ({s})")),
        }
    }
}
