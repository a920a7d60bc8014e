use std::fmt::Debug;

use log::*;
use sg_common::{FeeRate, Money};

use crate::{
    db_types::{Merchant, NewMerchant, NewPaymentGateway, OrderNo, PaymentGateway, Transaction},
    engine_api::errors::SettlementError,
    traits::SettlementDatabase,
    EngineConfig,
};

/// Merchant and gateway administration, plus read access for the admin UI.
pub struct MerchantApi<B> {
    db: B,
    config: EngineConfig,
}

impl<B> Debug for MerchantApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MerchantApi")
    }
}

impl<B> MerchantApi<B> {
    pub fn new(db: B, config: EngineConfig) -> Self {
        Self { db, config }
    }
}

impl<B> MerchantApi<B>
where B: SettlementDatabase
{
    pub async fn create_gateway(&self, gateway: NewPaymentGateway) -> Result<PaymentGateway, SettlementError> {
        let gateway = self.db.create_gateway(gateway).await?;
        info!("🔄️🏦️ Gateway {} created", gateway.code);
        Ok(gateway)
    }

    pub async fn set_gateway_active(&self, code: &str, active: bool) -> Result<PaymentGateway, SettlementError> {
        let gateway = self.db.set_gateway_active(code, active).await?;
        info!("🔄️🏦️ Gateway {code} is now {}", if active { "active" } else { "inactive" });
        Ok(gateway)
    }

    pub async fn gateway(&self, code: &str) -> Result<Option<PaymentGateway>, SettlementError> {
        Ok(self.db.fetch_gateway_by_code(code).await?)
    }

    /// Onboards a merchant. Fee rates that are not given take the configured defaults.
    pub async fn create_merchant(&self, mut merchant: NewMerchant) -> Result<Merchant, SettlementError> {
        merchant.payin_fee = merchant.payin_fee.or(Some(self.config.default_payin_fee));
        merchant.payout_fee = merchant.payout_fee.or(Some(self.config.default_payout_fee));
        let merchant = self.db.create_merchant(merchant).await?;
        info!(
            "🔄️🏦️ Merchant {} onboarded. Pay-in fee: {}, payout fee: {}",
            merchant.account_number, merchant.payin_fee, merchant.payout_fee
        );
        Ok(merchant)
    }

    pub async fn set_merchant_active(&self, account_number: &str, active: bool) -> Result<Merchant, SettlementError> {
        let merchant = self.db.set_merchant_active(account_number, active).await?;
        info!("🔄️🏦️ Merchant {account_number} is now {}", if active { "active" } else { "inactive" });
        Ok(merchant)
    }

    pub async fn set_fees(
        &self,
        account_number: &str,
        payin_fee: FeeRate,
        payout_fee: FeeRate,
    ) -> Result<Merchant, SettlementError> {
        let merchant = self.db.set_merchant_fees(account_number, payin_fee, payout_fee).await?;
        info!("🔄️🏦️ Merchant {account_number} fees changed to {payin_fee} (pay-in) and {payout_fee} (payout)");
        Ok(merchant)
    }

    pub async fn merchant(&self, account_number: &str) -> Result<Merchant, SettlementError> {
        self.db
            .fetch_merchant_by_account(account_number)
            .await?
            .ok_or_else(|| SettlementError::UnknownMerchant(account_number.to_string()))
    }

    pub async fn recent_transactions(
        &self,
        account_number: &str,
        limit: i64,
    ) -> Result<Vec<Transaction>, SettlementError> {
        let merchant = self.merchant(account_number).await?;
        Ok(self.db.fetch_transactions_for_merchant(merchant.id, limit).await?)
    }

    pub async fn transaction(&self, order_no: &OrderNo) -> Result<Transaction, SettlementError> {
        self.db.fetch_transaction(order_no).await?.ok_or_else(|| SettlementError::OrderNotFound(order_no.to_string()))
    }

    /// Tops up a merchant's available balance by hand. Each `reference` can be credited exactly once.
    pub async fn credit(
        &self,
        account_number: &str,
        amount: Money,
        reference: &str,
    ) -> Result<Merchant, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::InvalidRequest("The amount must be positive".to_string()));
        }
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SettlementError::InvalidRequest("A credit reference is required".to_string()));
        }
        let merchant = self.db.credit_merchant(account_number, amount, reference).await?;
        warn!(
            "🔄️🏦️ Manual credit {reference}: {amount} added to merchant {account_number}. Balance is now {}",
            merchant.balance
        );
        Ok(merchant)
    }
}
