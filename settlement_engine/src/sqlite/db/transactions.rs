//! Order persistence.
//!
//! Status changes are compare-and-set updates on `status = 'pending'`, and the event log is appended in the same
//! statement as the change it describes. A trigger in the schema also refuses any change to a final status, so even a
//! buggy caller cannot reopen an order.
use chrono::Duration;
use log::*;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewTransaction, OrderNo, OrderStatusType, SettlementEvent, Transaction},
    traits::{InsertOrderResult, SettlementDbError},
};

fn encode_event(event: &SettlementEvent) -> Result<String, SettlementDbError> {
    serde_json::to_string(event).map_err(|e| SettlementDbError::EventEncodingError(e.to_string()))
}

/// Inserts the order, unless the merchant already used this merchant order number, in which case the existing order
/// is returned. The unique index on `(merchant_id, merchant_order_no)` makes this safe under concurrency.
pub(crate) async fn idempotent_insert(
    order: NewTransaction,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, SettlementDbError> {
    let merchant_id = order.merchant_id;
    let merchant_order_no = order.merchant_order_no.clone();
    let inserted: Option<Transaction> = sqlx::query_as(
        r#"
    INSERT INTO transactions (
        order_no, merchant_id, merchant_order_no, transaction_type, amount, fee, net_amount, currency,
        destination, callback_url, gateway_id, extra
    )
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
    ON CONFLICT (merchant_id, merchant_order_no) DO NOTHING
    RETURNING *
    "#,
    )
    .bind(order.order_no)
    .bind(order.merchant_id)
    .bind(order.merchant_order_no)
    .bind(order.transaction_type)
    .bind(order.amount)
    .bind(order.fee)
    .bind(order.net_amount)
    .bind(order.currency)
    .bind(order.destination.map(Json))
    .bind(order.callback_url)
    .bind(order.gateway_id)
    .bind(order.extra)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .next();
    match inserted {
        Some(t) => {
            debug!("🗃️ Order {} saved for merchant #{merchant_id} ({merchant_order_no})", t.order_no);
            Ok(InsertOrderResult::Inserted(t))
        },
        None => {
            let existing = fetch_by_merchant_order(merchant_id, &merchant_order_no, conn).await?.ok_or_else(|| {
                SettlementDbError::DatabaseError(format!(
                    "Order {merchant_order_no} for merchant #{merchant_id} conflicted but could not be found"
                ))
            })?;
            debug!("🗃️ Merchant #{merchant_id} resubmitted {merchant_order_no}. It is order {}", existing.order_no);
            Ok(InsertOrderResult::AlreadyExists(existing))
        },
    }
}

pub(crate) async fn fetch_by_order_no(
    order_no: &OrderNo,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result =
        sqlx::query_as("SELECT * FROM transactions WHERE order_no = $1").bind(order_no).fetch_optional(conn).await?;
    Ok(result)
}

pub(crate) async fn fetch_by_merchant_order(
    merchant_id: i64,
    merchant_order_no: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result = sqlx::query_as("SELECT * FROM transactions WHERE merchant_id = $1 AND merchant_order_no = $2")
        .bind(merchant_id)
        .bind(merchant_order_no)
        .fetch_optional(conn)
        .await?;
    Ok(result)
}

/// Sets `approved_at` on a pending, unclaimed payout. Returns `None` if the order is not in that state.
pub(crate) async fn claim_for_dispatch(
    order_no: &OrderNo,
    event: &SettlementEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
    UPDATE transactions SET
        approved_at = CURRENT_TIMESTAMP,
        callback_data = json_insert(callback_data, '$[#]', json($1)),
        updated_at = CURRENT_TIMESTAMP
    WHERE order_no = $2 AND transaction_type = 'payout' AND status = 'pending' AND approved_at IS NULL
    RETURNING *
    "#,
    )
    .bind(encode_event(event)?)
    .bind(order_no)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(result)
}

/// Stores the provider's references for an order. Existing references are kept when the new value is `None`.
pub(crate) async fn record_submission(
    order_no: &OrderNo,
    provider_order_id: Option<&str>,
    payment_url: Option<&str>,
    event: &SettlementEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
    UPDATE transactions SET
        provider_order_id = COALESCE($1, provider_order_id),
        payment_url = COALESCE($2, payment_url),
        callback_data = json_insert(callback_data, '$[#]', json($3)),
        updated_at = CURRENT_TIMESTAMP
    WHERE order_no = $4
    RETURNING *
    "#,
    )
    .bind(provider_order_id)
    .bind(payment_url)
    .bind(encode_event(event)?)
    .bind(order_no)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(result)
}

pub(crate) async fn append_event(
    order_no: &OrderNo,
    event: &SettlementEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
    UPDATE transactions SET
        callback_data = json_insert(callback_data, '$[#]', json($1)),
        updated_at = CURRENT_TIMESTAMP
    WHERE order_no = $2
    RETURNING *
    "#,
    )
    .bind(encode_event(event)?)
    .bind(order_no)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(result)
}

/// Moves a pending order to `status`. Returns `None` if the order was not pending.
pub(crate) async fn finalize_pending(
    order_no: &OrderNo,
    status: OrderStatusType,
    event: &SettlementEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
    UPDATE transactions SET
        status = $1,
        callback_data = json_insert(callback_data, '$[#]', json($2)),
        updated_at = CURRENT_TIMESTAMP
    WHERE order_no = $3 AND status = 'pending'
    RETURNING *
    "#,
    )
    .bind(status)
    .bind(encode_event(event)?)
    .bind(order_no)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(result)
}

/// Fails a pending payout that has not been claimed for dispatch. Returns `None` if the order is not in that state.
pub(crate) async fn fail_undispatched_payout(
    order_no: &OrderNo,
    event: &SettlementEvent,
    conn: &mut SqliteConnection,
) -> Result<Option<Transaction>, SettlementDbError> {
    let result: Option<Transaction> = sqlx::query_as(
        r#"
    UPDATE transactions SET
        status = 'failed',
        callback_data = json_insert(callback_data, '$[#]', json($1)),
        updated_at = CURRENT_TIMESTAMP
    WHERE order_no = $2 AND transaction_type = 'payout' AND status = 'pending' AND approved_at IS NULL
    RETURNING *
    "#,
    )
    .bind(encode_event(event)?)
    .bind(order_no)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    Ok(result)
}

/// Pending pay-ins created at least `older_than` ago, oldest first.
pub(crate) async fn stale_payins(
    older_than: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, SettlementDbError> {
    let modifier = format!("-{} seconds", older_than.num_seconds());
    let result = sqlx::query_as(
        r#"
    SELECT * FROM transactions
    WHERE status = 'pending' AND transaction_type = 'payin' AND created_at <= datetime('now', $1)
    ORDER BY created_at ASC
    "#,
    )
    .bind(modifier)
    .fetch_all(conn)
    .await?;
    Ok(result)
}
