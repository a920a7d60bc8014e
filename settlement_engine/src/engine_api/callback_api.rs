use std::fmt::Debug;

use log::*;
use serde_json::Value;

use crate::{
    db_types::{SettlementEvent, Transaction},
    engine_api::errors::SettlementError,
    events::{EventProducers, OrderSettledEvent},
    traits::{SettlementDatabase, TransitionResult, UpstreamError, UpstreamGateway},
};

/// What a provider callback did to its order.
#[derive(Debug, Clone)]
pub enum CallbackResult {
    /// The order moved to a final status and the ledger was updated.
    Settled(Transaction),
    /// The order was already final. This is a replay and nothing changed.
    AlreadyFinal(Transaction),
    /// An intermediate status report. It was logged on the order, which stays pending.
    Progress(Transaction),
}

impl CallbackResult {
    pub fn transaction(&self) -> &Transaction {
        match self {
            CallbackResult::Settled(t) | CallbackResult::AlreadyFinal(t) | CallbackResult::Progress(t) => t,
        }
    }
}

/// Ingests provider webhooks.
///
/// Providers retry webhooks freely, so every callback may arrive more than once, possibly concurrently. The final
/// transition is a single compare-and-set on `status = 'pending'` together with its ledger movement, so only one
/// delivery can ever apply it.
pub struct CallbackApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for CallbackApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallbackApi")
    }
}

impl<B, G> CallbackApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> CallbackApi<B, G>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    /// Verifies a callback for the gateway with code `gateway_code` and applies it.
    ///
    /// When this returns, any state change has been committed.
    pub async fn handle_callback(
        &self,
        gateway_code: &str,
        payload: &Value,
    ) -> Result<CallbackResult, SettlementError> {
        let gateway = self
            .db
            .fetch_gateway_by_code(gateway_code)
            .await?
            .ok_or_else(|| SettlementError::GatewayUnavailable(format!("Unknown gateway {gateway_code}")))?;
        let callback = self.gateway.translate_callback(&gateway, payload).map_err(|e| match e {
            UpstreamError::SignatureInvalid => {
                warn!("📬️ Dropping callback for gateway {gateway_code} with an invalid signature: {payload}");
                SettlementError::CallbackSignatureInvalid
            },
            e => {
                warn!("📬️ Dropping unreadable callback for gateway {gateway_code}. {e}. Payload: {payload}");
                SettlementError::InvalidRequest(e.to_string())
            },
        })?;
        let order_no = &callback.order_no;
        let order = self.db.fetch_transaction(order_no).await?.ok_or_else(|| {
            warn!("📬️ Callback from {gateway_code} refers to unknown order {order_no}");
            SettlementError::OrderNotFound(order_no.to_string())
        })?;
        if order.gateway_id != gateway.id {
            warn!("📬️ Callback from {gateway_code} refers to order {order_no}, which belongs to another gateway");
            return Err(SettlementError::InvalidRequest(format!("Order {order_no} does not belong to {gateway_code}")));
        }
        if order.is_payout() && !order.is_dispatched() {
            warn!("📬️ Callback from {gateway_code} for payout {order_no}, which was never dispatched. Ignoring it.");
            return Err(SettlementError::InvalidRequest(format!("Payout {order_no} has not been dispatched")));
        }
        if let Some(amount) = callback.amount {
            if amount != order.amount {
                error!(
                    "📬️ Callback for {order_no} reports {amount} but the order is for {}. Leaving the order for manual \
                     reconciliation. Payload: {payload}",
                    order.amount
                );
                return Err(SettlementError::InvalidRequest(format!("Amount mismatch for order {order_no}")));
            }
        }
        let event = SettlementEvent::callback(&callback.outcome.to_string(), callback.raw.clone());
        let Some(outcome) = callback.outcome.final_outcome() else {
            debug!("📬️ Progress report for {order_no} from {gateway_code}: {}", callback.outcome);
            let order = self.db.append_event(order_no, event).await?;
            return Ok(CallbackResult::Progress(order));
        };
        match self.db.finalize_transaction(order_no, outcome, event).await? {
            TransitionResult::Applied(t) => {
                info!("📬️ Order {order_no} is now {} after a callback from {gateway_code}", t.status);
                self.producers.publish_order_settled(OrderSettledEvent::new(t.clone())).await;
                Ok(CallbackResult::Settled(t))
            },
            TransitionResult::AlreadyFinal(t) => {
                debug!("📬️ Order {order_no} is already {}. Ignoring the replayed callback.", t.status);
                Ok(CallbackResult::AlreadyFinal(t))
            },
        }
    }
}
