use sqlx::SqliteConnection;

use crate::{
    db_types::{NewPaymentGateway, PaymentGateway},
    traits::MerchantApiError,
};

pub(crate) async fn insert_gateway(
    gateway: NewPaymentGateway,
    conn: &mut SqliteConnection,
) -> Result<PaymentGateway, MerchantApiError> {
    let payout_key = gateway.payout_key.map(|k| k.reveal().clone()).unwrap_or_default();
    let result: PaymentGateway = sqlx::query_as(
        r#"
    INSERT INTO gateways
        (code, gateway_type, base_url, app_id, api_key, payout_key, currency, trade_type, min_withdrawal)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
    RETURNING *
    "#,
    )
    .bind(gateway.code)
    .bind(gateway.gateway_type)
    .bind(gateway.base_url.trim_end_matches('/'))
    .bind(gateway.app_id)
    .bind(gateway.api_key.reveal())
    .bind(payout_key)
    .bind(gateway.currency)
    .bind(gateway.trade_type)
    .bind(gateway.min_withdrawal)
    .fetch_all(conn)
    .await?
    .pop()
    .ok_or(sqlx::Error::RowNotFound)?;
    Ok(result)
}

pub(crate) async fn fetch_gateway(
    id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentGateway>, MerchantApiError> {
    let gateway = sqlx::query_as("SELECT * FROM gateways WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(gateway)
}

pub(crate) async fn fetch_gateway_by_code(
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentGateway>, MerchantApiError> {
    let gateway = sqlx::query_as("SELECT * FROM gateways WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(gateway)
}

pub(crate) async fn set_gateway_active(
    code: &str,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<PaymentGateway, MerchantApiError> {
    let gateway: Option<PaymentGateway> = sqlx::query_as(
        "UPDATE gateways SET is_active = $1, updated_at = CURRENT_TIMESTAMP WHERE code = $2 RETURNING *",
    )
    .bind(active)
    .bind(code)
    .fetch_all(conn)
    .await?
    .into_iter()
    .next();
    gateway.ok_or_else(|| MerchantApiError::GatewayNotFound(code.to_string()))
}
