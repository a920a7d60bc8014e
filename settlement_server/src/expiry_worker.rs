use log::*;
use settlement_engine::{db_types::Transaction, OrderFlowApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::integrations::ProviderGateways;

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the pay-in expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Pay-ins never touch the ledger while pending, so expiring them is always safe. Payouts are left alone: their funds
/// are frozen and only an admin or the provider can decide what happened to them.
pub fn start_expiry_worker(api: OrderFlowApi<SqliteDatabase, ProviderGateways>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        info!("🕰️ Pay-in expiry worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Running pay-in expiry job");
            match api.expire_payins().await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No pay-ins expired"),
                Ok(expired) => info!("🕰️ {} pay-ins expired: {}", expired.len(), order_list(&expired)),
                Err(e) => error!("🕰️ Error running pay-in expiry job: {e}"),
            }
        }
    })
}

fn order_list(orders: &[Transaction]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] merchant #{}: {}", o.order_no, o.merchant_id, o.merchant_order_no))
        .collect::<Vec<String>>()
        .join(", ")
}
