use sg_common::{FeeRate, Money};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Merchant, NewMerchant, Transaction},
    traits::MerchantApiError,
};

/// Inserts a new merchant with zero balances. Missing fee rates are stored as zero.
pub(crate) async fn insert_merchant(
    merchant: NewMerchant,
    conn: &mut SqliteConnection,
) -> Result<Merchant, MerchantApiError> {
    let payout_key = merchant.payout_key.map(|k| k.reveal().clone()).unwrap_or_default();
    let result: Merchant = sqlx::query_as(
        r#"
    INSERT INTO merchants (account_number, name, api_key, payout_key, gateway_id, payin_fee, payout_fee)
    VALUES ($1, $2, $3, $4, $5, $6, $7)
    RETURNING *
    "#,
    )
    .bind(merchant.account_number)
    .bind(merchant.name)
    .bind(merchant.api_key.reveal())
    .bind(payout_key)
    .bind(merchant.gateway_id)
    .bind(merchant.payin_fee.unwrap_or_default())
    .bind(merchant.payout_fee.unwrap_or_default())
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(result)
}

pub(crate) async fn fetch_merchant(id: i64, conn: &mut SqliteConnection) -> Result<Option<Merchant>, MerchantApiError> {
    let merchant = sqlx::query_as("SELECT * FROM merchants WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(merchant)
}

pub(crate) async fn fetch_merchant_by_account(
    account_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Merchant>, MerchantApiError> {
    let merchant = sqlx::query_as("SELECT * FROM merchants WHERE account_number = $1")
        .bind(account_number)
        .fetch_optional(conn)
        .await?;
    Ok(merchant)
}

pub(crate) async fn set_merchant_active(
    account_number: &str,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<Merchant, MerchantApiError> {
    let merchant: Option<Merchant> = sqlx::query_as(
        "UPDATE merchants SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE account_number = $2 RETURNING *",
    )
    .bind(active)
    .bind(account_number)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    merchant.ok_or_else(|| MerchantApiError::MerchantNotFound(account_number.to_string()))
}

pub(crate) async fn set_merchant_fees(
    account_number: &str,
    payin_fee: FeeRate,
    payout_fee: FeeRate,
    conn: &mut SqliteConnection,
) -> Result<Merchant, MerchantApiError> {
    let merchant: Option<Merchant> = sqlx::query_as(
        r#"
    UPDATE merchants SET payin_fee = $1, payout_fee = $2, updated_at = CURRENT_TIMESTAMP
    WHERE account_number = $3
    RETURNING *
    "#,
    )
    .bind(payin_fee)
    .bind(payout_fee)
    .bind(account_number)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    merchant.ok_or_else(|| MerchantApiError::MerchantNotFound(account_number.to_string()))
}

/// Records a manual credit for the merchant. Returns the merchant id, or `None` if the merchant does not exist or the
/// reference has been used before. The balance itself is left to [`super::ledger::credit_available`].
pub(crate) async fn insert_manual_credit(
    account_number: &str,
    amount: Money,
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<i64>, MerchantApiError> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
    INSERT INTO manual_credits (reference, merchant_id, amount)
    SELECT $1, id, $2 FROM merchants WHERE account_number = $3
    ON CONFLICT (reference) DO NOTHING
    RETURNING merchant_id
    "#,
    )
    .bind(reference)
    .bind(amount)
    .bind(account_number)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().next().map(|(id,)| id))
}

pub(crate) async fn transactions_for_merchant(
    merchant_id: i64,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Transaction>, MerchantApiError> {
    let transactions = sqlx::query_as("SELECT * FROM transactions WHERE merchant_id = $1 ORDER BY id DESC LIMIT $2")
        .bind(merchant_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(transactions)
}
