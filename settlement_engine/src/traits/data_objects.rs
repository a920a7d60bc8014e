use serde::{Deserialize, Serialize};

use crate::db_types::Transaction;

/// The result of an idempotent order insert.
#[derive(Debug, Clone)]
pub enum InsertOrderResult {
    Inserted(Transaction),
    /// An order with the same merchant order number already exists. No balances were touched.
    AlreadyExists(Transaction),
}

/// The result of asking for a `pending → success | failed` transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransitionResult {
    /// The transition happened, together with its ledger effect.
    Applied(Transaction),
    /// The order was already final. Nothing changed.
    AlreadyFinal(Transaction),
}

impl TransitionResult {
    pub fn transaction(&self) -> &Transaction {
        match self {
            TransitionResult::Applied(t) => t,
            TransitionResult::AlreadyFinal(t) => t,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            TransitionResult::Applied(t) => t,
            TransitionResult::AlreadyFinal(t) => t,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied(_))
    }
}
