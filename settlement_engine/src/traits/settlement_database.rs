use chrono::Duration;
use sg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{FinalOutcome, Merchant, NewTransaction, OrderNo, OrderStatusType, SettlementEvent, Transaction},
    traits::{
        data_objects::{InsertOrderResult, TransitionResult},
        MerchantApiError,
        MerchantManagement,
    },
};

/// This trait defines the behaviour that a storage backend must provide for the settlement flows.
///
/// Every method that changes a balance does so inside one database transaction, using conditional updates so that
/// concurrent callers can never both pass a stale check. The four ledger movements are:
///
/// * debit available and freeze (payout created),
/// * release frozen back to available (payout rejected or failed),
/// * settle frozen out (payout succeeded),
/// * credit available (pay-in succeeded).
///
/// There is no other way to change `balance` or `frozen_balance`.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + MerchantManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new pay-in order in `pending` status. Pay-ins have no balance effect until they succeed.
    ///
    /// If the merchant already has an order with the same merchant order number, that order is returned instead.
    async fn insert_payin(&self, order: NewTransaction) -> Result<InsertOrderResult, SettlementDbError>;

    /// Stores a new payout order in `pending` status and freezes `amount` of the merchant's available balance, in one
    /// atomic step. If the balance is insufficient, nothing is stored.
    ///
    /// If the merchant already has an order with the same merchant order number, that order is returned instead and
    /// no funds are frozen.
    async fn insert_payout_and_freeze(&self, order: NewTransaction) -> Result<InsertOrderResult, SettlementDbError>;

    async fn fetch_transaction(&self, order_no: &OrderNo) -> Result<Option<Transaction>, SettlementDbError>;

    async fn fetch_transaction_by_merchant_order(
        &self,
        merchant_id: i64,
        merchant_order_no: &str,
    ) -> Result<Option<Transaction>, SettlementDbError>;

    /// Atomically claims a pending payout for dispatch to the provider, recording an `Approved` event.
    ///
    /// Exactly one caller can ever claim a given order. Everyone else receives `AlreadyProcessing` (or
    /// `OrderAlreadyFinalized` if the order has finished).
    async fn claim_payout_for_dispatch(&self, order_no: &OrderNo) -> Result<Transaction, SettlementDbError>;

    /// Records what the provider said about a submission, without changing the order status.
    async fn record_submission(
        &self,
        order_no: &OrderNo,
        provider_order_id: Option<&str>,
        payment_url: Option<&str>,
        event: SettlementEvent,
    ) -> Result<Transaction, SettlementDbError>;

    /// Appends an event to the order log without changing anything else.
    async fn append_event(&self, order_no: &OrderNo, event: SettlementEvent) -> Result<Transaction, SettlementDbError>;

    /// Moves a pending order to its final status and applies the matching ledger movement, all in one transaction:
    ///
    /// | type   | outcome | ledger                      |
    /// |--------|---------|-----------------------------|
    /// | payin  | success | credit `net_amount`         |
    /// | payin  | failed  | none                        |
    /// | payout | success | settle `amount` out         |
    /// | payout | failed  | release `amount` to balance |
    ///
    /// If the order is already final, it is returned untouched as [`TransitionResult::AlreadyFinal`].
    async fn finalize_transaction(
        &self,
        order_no: &OrderNo,
        outcome: FinalOutcome,
        event: SettlementEvent,
    ) -> Result<TransitionResult, SettlementDbError>;

    /// Fails a payout that has not been claimed for dispatch and releases its frozen funds, in one transaction.
    ///
    /// Unlike [`Self::finalize_transaction`], this is not idempotent: a second rejection yields
    /// `OrderAlreadyFinalized`, and a dispatched payout yields `AlreadyProcessing`.
    async fn reject_undispatched_payout(
        &self,
        order_no: &OrderNo,
        event: SettlementEvent,
    ) -> Result<Transaction, SettlementDbError>;

    /// Pending pay-ins created more than `older_than` ago.
    async fn fetch_stale_payins(&self, older_than: Duration) -> Result<Vec<Transaction>, SettlementDbError>;

    /// A manual top-up of a merchant's available balance (e.g. an offline deposit), through the credit ledger movement.
    ///
    /// `reference` identifies the top-up. It is stored with the credit in the same transaction, and a reference that
    /// was used before yields `DuplicateCredit` without touching the balance.
    async fn credit_merchant(
        &self,
        account_number: &str,
        amount: Money,
        reference: &str,
    ) -> Result<Merchant, SettlementDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementDbError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementDbError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("{0}")]
    MerchantError(#[from] MerchantApiError),
    #[error("Merchant #{0} does not exist")]
    MerchantNotFound(i64),
    #[error("Insufficient balance. Available: {available}, requested: {requested}")]
    InsufficientBalance { available: Money, requested: Money },
    #[error("Frozen balance of merchant #{merchant_id} is lower than {amount}. The ledger is inconsistent.")]
    FrozenBalanceTooLow { merchant_id: i64, amount: Money },
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderNo),
    #[error("Order {0} is not a payout")]
    NotAPayout(OrderNo),
    #[error("Order {0} has already been dispatched to the provider")]
    AlreadyProcessing(OrderNo),
    #[error("Order {0} is already {1}")]
    OrderAlreadyFinalized(OrderNo, OrderStatusType),
    #[error("Credit reference {0} has already been used")]
    DuplicateCredit(String),
    #[error("Could not encode the order event log: {0}")]
    EventEncodingError(String),
}

impl From<sqlx::Error> for SettlementDbError {
    fn from(e: sqlx::Error) -> Self {
        SettlementDbError::DatabaseError(e.to_string())
    }
}
