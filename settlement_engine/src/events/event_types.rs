use serde::{Deserialize, Serialize};

use crate::db_types::{OrderStatusType, Transaction};

/// Emitted once, right after an order reaches `success` or `failed` and the ledger movement has been committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSettledEvent {
    pub transaction: Transaction,
}

impl OrderSettledEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }

    pub fn status(&self) -> OrderStatusType {
        self.transaction.status
    }
}

/// Emitted when the provider has accepted a payout and the order is waiting for its callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSubmittedEvent {
    pub transaction: Transaction,
}

impl PayoutSubmittedEvent {
    pub fn new(transaction: Transaction) -> Self {
        Self { transaction }
    }
}

#[derive(Debug, Clone)]
pub enum EventType {
    OrderSettled(OrderSettledEvent),
    PayoutSubmitted(PayoutSubmittedEvent),
}
