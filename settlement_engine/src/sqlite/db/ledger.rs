//! The four balance movements.
//!
//! Each movement is a single conditional `UPDATE`. The precondition lives in the `WHERE` clause, so two concurrent
//! movements can never both pass a check against the same stale balance. When the precondition fails, the row is
//! re-read only to build a useful error.
use log::*;
use sg_common::Money;
use sqlx::SqliteConnection;

use crate::{db_types::Merchant, traits::SettlementDbError};

/// `balance -= amount; frozen_balance += amount`, provided `balance >= amount`.
pub(crate) async fn debit_available_freeze(
    merchant_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Merchant, SettlementDbError> {
    let merchant: Option<Merchant> = sqlx::query_as(
        r#"
    UPDATE merchants SET
        balance = balance - $1,
        frozen_balance = frozen_balance + $1,
        updated_at = CURRENT_TIMESTAMP
    WHERE id = $2 AND balance >= $1
    RETURNING *
    "#,
    )
    .bind(amount)
    .bind(merchant_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    match merchant {
        Some(m) => {
            trace!("🗃️ Froze {amount} for merchant #{merchant_id}. Left: {}, frozen: {}", m.balance, m.frozen_balance);
            Ok(m)
        },
        None => {
            let m = current_state(merchant_id, conn).await?;
            Err(SettlementDbError::InsufficientBalance { available: m.balance, requested: amount })
        },
    }
}

/// `frozen_balance -= amount; balance += amount`, provided `frozen_balance >= amount`.
pub(crate) async fn release_frozen(
    merchant_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Merchant, SettlementDbError> {
    let merchant: Option<Merchant> = sqlx::query_as(
        r#"
    UPDATE merchants SET
        balance = balance + $1,
        frozen_balance = frozen_balance - $1,
        updated_at = CURRENT_TIMESTAMP
    WHERE id = $2 AND frozen_balance >= $1
    RETURNING *
    "#,
    )
    .bind(amount)
    .bind(merchant_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    match merchant {
        Some(m) => {
            trace!("🗃️ Released {amount} for merchant #{merchant_id}. Available: {}", m.balance);
            Ok(m)
        },
        None => {
            current_state(merchant_id, conn).await?;
            Err(SettlementDbError::FrozenBalanceTooLow { merchant_id, amount })
        },
    }
}

/// `frozen_balance -= amount`, provided `frozen_balance >= amount`. The funds leave the system.
pub(crate) async fn settle_frozen_out(
    merchant_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Merchant, SettlementDbError> {
    let merchant: Option<Merchant> = sqlx::query_as(
        r#"
    UPDATE merchants SET
        frozen_balance = frozen_balance - $1,
        updated_at = CURRENT_TIMESTAMP
    WHERE id = $2 AND frozen_balance >= $1
    RETURNING *
    "#,
    )
    .bind(amount)
    .bind(merchant_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    match merchant {
        Some(m) => {
            trace!("🗃️ Settled {amount} out of merchant #{merchant_id}. Frozen: {}", m.frozen_balance);
            Ok(m)
        },
        None => {
            current_state(merchant_id, conn).await?;
            Err(SettlementDbError::FrozenBalanceTooLow { merchant_id, amount })
        },
    }
}

/// `balance += amount`.
pub(crate) async fn credit_available(
    merchant_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<Merchant, SettlementDbError> {
    let merchant: Option<Merchant> = sqlx::query_as(
        "UPDATE merchants SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(amount)
    .bind(merchant_id)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    let m = merchant.ok_or(SettlementDbError::MerchantNotFound(merchant_id))?;
    trace!("🗃️ Credited {amount} to merchant #{merchant_id}. Available: {}", m.balance);
    Ok(m)
}

async fn current_state(merchant_id: i64, conn: &mut SqliteConnection) -> Result<Merchant, SettlementDbError> {
    let merchant: Option<Merchant> =
        sqlx::query_as("SELECT * FROM merchants WHERE id = $1").bind(merchant_id).fetch_optional(conn).await?;
    merchant.ok_or(SettlementDbError::MerchantNotFound(merchant_id))
}
