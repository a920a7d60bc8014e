//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
//!
//! SQLite serialises writers, so every transaction here starts with its write statement. A transaction that reads first
//! and writes later can deadlock against a concurrent writer when it tries to upgrade its lock.
use std::fmt::Debug;

use chrono::Duration;
use log::*;
use sg_common::{FeeRate, Money};
use sqlx::SqlitePool;

use super::db::{db_url, gateways, ledger, merchants, new_pool, transactions};
use crate::{
    db_types::{
        FinalOutcome,
        Merchant,
        NewMerchant,
        NewPaymentGateway,
        NewTransaction,
        OrderNo,
        OrderStatusType,
        PaymentGateway,
        SettlementEvent,
        Transaction,
        TransactionType,
    },
    traits::{
        InsertOrderResult,
        MerchantApiError,
        MerchantManagement,
        SettlementDatabase,
        SettlementDbError,
        TransitionResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_payin(&self, order: NewTransaction) -> Result<InsertOrderResult, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        transactions::idempotent_insert(order, &mut conn).await
    }

    /// In a single atomic transaction,
    /// * inserts the order. If the merchant order number is already taken, the existing order is returned and nothing
    ///   else happens.
    /// * moves `amount` from the merchant's available balance to its frozen balance. If the balance is too low, the
    ///   whole transaction is rolled back and the order is never stored.
    async fn insert_payout_and_freeze(&self, order: NewTransaction) -> Result<InsertOrderResult, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let merchant_id = order.merchant_id;
        let amount = order.amount;
        let result = transactions::idempotent_insert(order, &mut tx).await?;
        if let InsertOrderResult::Inserted(t) = &result {
            ledger::debit_available_freeze(merchant_id, amount, &mut tx).await?;
            debug!("🗃️ Payout {} stored and {amount} frozen for merchant #{merchant_id}", t.order_no);
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_transaction(&self, order_no: &OrderNo) -> Result<Option<Transaction>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_order_no(order_no, &mut conn).await
    }

    async fn fetch_transaction_by_merchant_order(
        &self,
        merchant_id: i64,
        merchant_order_no: &str,
    ) -> Result<Option<Transaction>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        transactions::fetch_by_merchant_order(merchant_id, merchant_order_no, &mut conn).await
    }

    async fn claim_payout_for_dispatch(&self, order_no: &OrderNo) -> Result<Transaction, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = transactions::claim_for_dispatch(order_no, &SettlementEvent::approved(), &mut conn).await?;
        match claimed {
            Some(t) => {
                debug!("🗃️ Payout {order_no} claimed for dispatch");
                Ok(t)
            },
            None => {
                let existing = transactions::fetch_by_order_no(order_no, &mut conn).await?;
                Err(unclaimable_reason(order_no, existing))
            },
        }
    }

    async fn record_submission(
        &self,
        order_no: &OrderNo,
        provider_order_id: Option<&str>,
        payment_url: Option<&str>,
        event: SettlementEvent,
    ) -> Result<Transaction, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        transactions::record_submission(order_no, provider_order_id, payment_url, &event, &mut conn)
            .await?
            .ok_or_else(|| SettlementDbError::OrderNotFound(order_no.clone()))
    }

    async fn append_event(&self, order_no: &OrderNo, event: SettlementEvent) -> Result<Transaction, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        transactions::append_event(order_no, &event, &mut conn)
            .await?
            .ok_or_else(|| SettlementDbError::OrderNotFound(order_no.clone()))
    }

    async fn finalize_transaction(
        &self,
        order_no: &OrderNo,
        outcome: FinalOutcome,
        event: SettlementEvent,
    ) -> Result<TransitionResult, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let status = OrderStatusType::from(outcome);
        let updated = transactions::finalize_pending(order_no, status, &event, &mut tx).await?;
        let Some(order) = updated else {
            let existing = transactions::fetch_by_order_no(order_no, &mut tx)
                .await?
                .ok_or_else(|| SettlementDbError::OrderNotFound(order_no.clone()))?;
            tx.commit().await?;
            debug!("🗃️ Order {order_no} is already {}. Nothing to do.", existing.status);
            return Ok(TransitionResult::AlreadyFinal(existing));
        };
        let merchant_id = order.merchant_id;
        match (order.transaction_type, outcome) {
            (TransactionType::Payin, FinalOutcome::Success) => {
                ledger::credit_available(merchant_id, order.net_amount, &mut tx).await?;
            },
            (TransactionType::Payin, FinalOutcome::Failed) => {},
            (TransactionType::Payout, FinalOutcome::Success) => {
                ledger::settle_frozen_out(merchant_id, order.amount, &mut tx).await?;
            },
            (TransactionType::Payout, FinalOutcome::Failed) => {
                ledger::release_frozen(merchant_id, order.amount, &mut tx).await?;
            },
        }
        tx.commit().await?;
        debug!("🗃️ Order {order_no} is now {status}");
        Ok(TransitionResult::Applied(order))
    }

    async fn reject_undispatched_payout(
        &self,
        order_no: &OrderNo,
        event: SettlementEvent,
    ) -> Result<Transaction, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let updated = transactions::fail_undispatched_payout(order_no, &event, &mut tx).await?;
        let Some(order) = updated else {
            let existing = transactions::fetch_by_order_no(order_no, &mut tx).await?;
            return Err(unclaimable_reason(order_no, existing));
        };
        ledger::release_frozen(order.merchant_id, order.amount, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Payout {order_no} rejected. {} released to merchant #{}", order.amount, order.merchant_id);
        Ok(order)
    }

    async fn fetch_stale_payins(&self, older_than: Duration) -> Result<Vec<Transaction>, SettlementDbError> {
        let mut conn = self.pool.acquire().await?;
        transactions::stale_payins(older_than, &mut conn).await
    }

    /// The credit reference and the balance change are committed together, so a reference is spent if and only if
    /// the merchant was paid.
    async fn credit_merchant(
        &self,
        account_number: &str,
        amount: Money,
        reference: &str,
    ) -> Result<Merchant, SettlementDbError> {
        let mut tx = self.pool.begin().await?;
        let inserted = merchants::insert_manual_credit(account_number, amount, reference, &mut tx).await?;
        let Some(merchant_id) = inserted else {
            let known = merchants::fetch_merchant_by_account(account_number, &mut tx).await?.is_some();
            return if known {
                Err(SettlementDbError::DuplicateCredit(reference.to_string()))
            } else {
                Err(MerchantApiError::MerchantNotFound(account_number.to_string()).into())
            };
        };
        let merchant = ledger::credit_available(merchant_id, amount, &mut tx).await?;
        tx.commit().await?;
        info!("🗃️ Manual credit {reference} of {amount} to merchant {account_number}. Available: {}", merchant.balance);
        Ok(merchant)
    }

    async fn close(&mut self) -> Result<(), SettlementDbError> {
        self.pool.close().await;
        Ok(())
    }
}

/// Works out why a payout could not be claimed or rejected.
fn unclaimable_reason(order_no: &OrderNo, existing: Option<Transaction>) -> SettlementDbError {
    match existing {
        None => SettlementDbError::OrderNotFound(order_no.clone()),
        Some(t) if !t.is_payout() => SettlementDbError::NotAPayout(order_no.clone()),
        Some(t) if t.status.is_final() => SettlementDbError::OrderAlreadyFinalized(order_no.clone(), t.status),
        Some(_) => SettlementDbError::AlreadyProcessing(order_no.clone()),
    }
}

impl MerchantManagement for SqliteDatabase {
    async fn create_gateway(&self, gateway: NewPaymentGateway) -> Result<PaymentGateway, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        let gateway = gateways::insert_gateway(gateway, &mut conn).await?;
        debug!("🗃️ Gateway {} ({}) created with id {}", gateway.code, gateway.gateway_type, gateway.id);
        Ok(gateway)
    }

    async fn fetch_gateway(&self, id: i64) -> Result<Option<PaymentGateway>, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        gateways::fetch_gateway(id, &mut conn).await
    }

    async fn fetch_gateway_by_code(&self, code: &str) -> Result<Option<PaymentGateway>, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        gateways::fetch_gateway_by_code(code, &mut conn).await
    }

    async fn set_gateway_active(&self, code: &str, active: bool) -> Result<PaymentGateway, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        gateways::set_gateway_active(code, active, &mut conn).await
    }

    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        let gateway_id = merchant.gateway_id;
        if gateways::fetch_gateway(gateway_id, &mut conn).await?.is_none() {
            return Err(MerchantApiError::GatewayNotFound(gateway_id.to_string()));
        }
        let merchant = merchants::insert_merchant(merchant, &mut conn).await?;
        debug!("🗃️ Merchant {} created with id {}", merchant.account_number, merchant.id);
        Ok(merchant)
    }

    async fn fetch_merchant(&self, id: i64) -> Result<Option<Merchant>, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        merchants::fetch_merchant(id, &mut conn).await
    }

    async fn fetch_merchant_by_account(&self, account_number: &str) -> Result<Option<Merchant>, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        merchants::fetch_merchant_by_account(account_number, &mut conn).await
    }

    async fn set_merchant_active(&self, account_number: &str, active: bool) -> Result<Merchant, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        merchants::set_merchant_active(account_number, active, &mut conn).await
    }

    async fn set_merchant_fees(
        &self,
        account_number: &str,
        payin_fee: FeeRate,
        payout_fee: FeeRate,
    ) -> Result<Merchant, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        merchants::set_merchant_fees(account_number, payin_fee, payout_fee, &mut conn).await
    }

    async fn fetch_transactions_for_merchant(
        &self,
        merchant_id: i64,
        limit: i64,
    ) -> Result<Vec<Transaction>, MerchantApiError> {
        let mut conn = self.pool.acquire().await?;
        merchants::transactions_for_merchant(merchant_id, limit, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date using the migrations embedded in this crate.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
