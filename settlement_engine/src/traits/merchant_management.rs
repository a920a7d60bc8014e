use sg_common::FeeRate;
use thiserror::Error;

use crate::db_types::{Merchant, NewMerchant, NewPaymentGateway, PaymentGateway, Transaction};

#[derive(Debug, Clone, Error)]
pub enum MerchantApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Merchant {0} does not exist")]
    MerchantNotFound(String),
    #[error("Gateway {0} does not exist")]
    GatewayNotFound(String),
    #[error("Record already exists ({0})")]
    AlreadyExists(String),
}

impl From<sqlx::Error> for MerchantApiError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::AlreadyExists(db.message().to_string()),
            _ => MerchantApiError::DatabaseError(e.to_string()),
        }
    }
}

/// Onboarding and read access for merchants and gateway profiles.
///
/// None of these methods touch a merchant's balances. Ledger changes go through [`crate::SettlementDatabase`].
#[allow(async_fn_in_trait)]
pub trait MerchantManagement {
    /// Stores a new upstream gateway profile. Gateway codes are unique.
    async fn create_gateway(&self, gateway: NewPaymentGateway) -> Result<PaymentGateway, MerchantApiError>;

    async fn fetch_gateway(&self, id: i64) -> Result<Option<PaymentGateway>, MerchantApiError>;

    async fn fetch_gateway_by_code(&self, code: &str) -> Result<Option<PaymentGateway>, MerchantApiError>;

    async fn set_gateway_active(&self, code: &str, active: bool) -> Result<PaymentGateway, MerchantApiError>;

    /// Stores a new merchant with zero balances. Fee rates that are not given default to zero.
    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, MerchantApiError>;

    async fn fetch_merchant(&self, id: i64) -> Result<Option<Merchant>, MerchantApiError>;

    async fn fetch_merchant_by_account(&self, account_number: &str) -> Result<Option<Merchant>, MerchantApiError>;

    /// Merchants are never deleted. Deactivated merchants cannot create new orders, but their open orders still settle.
    async fn set_merchant_active(&self, account_number: &str, active: bool) -> Result<Merchant, MerchantApiError>;

    /// Changes the fee rates for future orders. Existing orders keep the fees they were created with.
    async fn set_merchant_fees(
        &self,
        account_number: &str,
        payin_fee: FeeRate,
        payout_fee: FeeRate,
    ) -> Result<Merchant, MerchantApiError>;

    /// The most recent orders for the merchant, newest first.
    async fn fetch_transactions_for_merchant(
        &self,
        merchant_id: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, MerchantApiError>;
}
