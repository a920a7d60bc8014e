use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{FinalOutcome, OrderNo, SettlementEvent, Transaction},
    engine_api::errors::SettlementError,
    events::{EventProducers, OrderSettledEvent, PayoutSubmittedEvent},
    traits::{SettlementDatabase, TransitionResult, UpstreamGateway},
};

/// The admin side of payouts: approval (dispatch to the provider), rejection, and manual resolution of payouts whose
/// provider outcome is unknown.
pub struct PayoutApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
}

impl<B, G> Debug for PayoutApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B, G> PayoutApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers }
    }
}

impl<B, G> PayoutApi<B, G>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    /// Approves a pending payout and sends it to the provider.
    ///
    /// The order is claimed atomically first, so a payout is dispatched at most once no matter how many admins click
    /// "approve". Then:
    /// * provider accepts: the provider reference is stored and the order stays pending until the callback.
    /// * provider definitely refuses (or is unreachable): the frozen funds are released and the order fails.
    /// * outcome unknown (timeout): the order stays pending with its funds frozen, and `UpstreamTimeout` is returned.
    ///   A callback or a manual resolution settles it later.
    pub async fn approve(&self, order_no: &OrderNo) -> Result<Transaction, SettlementError> {
        let order = self.fetch_payout(order_no).await?;
        let gateway = self
            .db
            .fetch_gateway(order.gateway_id)
            .await?
            .ok_or_else(|| SettlementError::GatewayUnavailable(format!("Gateway #{} is missing", order.gateway_id)))?;
        if !gateway.is_active {
            return Err(SettlementError::GatewayUnavailable(format!("Gateway {} is inactive", gateway.code)));
        }
        let order = self.db.claim_payout_for_dispatch(order_no).await?;
        info!("🔄️✅️ Payout {order_no} approved. Submitting {} to {}", order.amount, gateway.code);
        match self.gateway.submit_payout(&gateway, &order).await {
            Ok(submitted) => {
                let event = SettlementEvent::submitted(&submitted.provider_order_id, submitted.raw);
                let order =
                    self.db.record_submission(order_no, Some(&submitted.provider_order_id), None, event).await?;
                info!("🔄️✅️ Payout {order_no} accepted by the provider as {}", submitted.provider_order_id);
                self.producers.publish_payout_submitted(PayoutSubmittedEvent::new(order.clone())).await;
                Ok(order)
            },
            Err(e) if e.is_definite_failure() => {
                warn!("🔄️✅️ The provider refused payout {order_no}. Releasing frozen funds. {e}");
                let event = SettlementEvent::submission_failed(&e.to_string());
                let result = self.db.finalize_transaction(order_no, FinalOutcome::Failed, event).await?;
                self.notify_if_settled(&result).await;
                Err(SettlementError::UpstreamSubmissionFailed { order_no: order_no.clone(), reason: e.to_string() })
            },
            Err(e) => {
                error!(
                    "🔄️✅️ Payout {order_no} may or may not have been accepted by the provider. Funds stay frozen \
                     until a callback arrives or an admin resolves it. {e}"
                );
                self.db.append_event(order_no, SettlementEvent::outcome_unknown(&e.to_string())).await?;
                Err(SettlementError::UpstreamTimeout { order_no: order_no.clone(), reason: e.to_string() })
            },
        }
    }

    /// Rejects a payout that has not been dispatched yet, returning the frozen amount to the merchant's balance.
    ///
    /// A second rejection fails with `OrderAlreadyFinalized` and credits nothing.
    pub async fn reject(&self, order_no: &OrderNo, reason: &str) -> Result<Transaction, SettlementError> {
        let order = self.db.reject_undispatched_payout(order_no, SettlementEvent::rejected(reason)).await?;
        info!("🔄️❌️ Payout {order_no} rejected. {} returned to merchant #{}", order.amount, order.merchant_id);
        self.producers.publish_order_settled(OrderSettledEvent::new(order.clone())).await;
        Ok(order)
    }

    /// Settles a dispatched payout by hand, e.g. after an `UpstreamTimeout` once the admin has checked with the
    /// provider. Undispatched payouts must be approved or rejected instead.
    pub async fn resolve(
        &self,
        order_no: &OrderNo,
        outcome: FinalOutcome,
        reason: &str,
    ) -> Result<Transaction, SettlementError> {
        let order = self.fetch_payout(order_no).await?;
        if order.status.is_final() {
            return Err(SettlementError::OrderAlreadyFinalized(order.order_no, order.status));
        }
        if !order.is_dispatched() {
            return Err(SettlementError::InvalidRequest(format!(
                "Payout {order_no} has not been dispatched. Approve or reject it instead."
            )));
        }
        let event = SettlementEvent::manually_resolved(outcome, reason);
        let result = self.db.finalize_transaction(order_no, outcome, event).await?;
        self.notify_if_settled(&result).await;
        match result {
            TransitionResult::Applied(t) => {
                info!("🔄️🛠️ Payout {order_no} manually resolved as {}", t.status);
                Ok(t)
            },
            TransitionResult::AlreadyFinal(t) => Err(SettlementError::OrderAlreadyFinalized(t.order_no, t.status)),
        }
    }

    async fn fetch_payout(&self, order_no: &OrderNo) -> Result<Transaction, SettlementError> {
        let order = self
            .db
            .fetch_transaction(order_no)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(order_no.to_string()))?;
        if !order.is_payout() {
            return Err(SettlementError::NotAPayout(order.order_no));
        }
        Ok(order)
    }

    async fn notify_if_settled(&self, result: &TransitionResult) {
        if let TransitionResult::Applied(t) = result {
            self.producers.publish_order_settled(OrderSettledEvent::new(t.clone())).await;
        }
    }
}
