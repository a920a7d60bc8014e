use std::fmt::Debug;

use log::*;
use sg_common::{SignedMessage, SignedParams};

use crate::{
    db_types::{FinalOutcome, Merchant, NewTransaction, PaymentGateway, SettlementEvent, Transaction, TransactionType},
    engine_api::{
        errors::SettlementError,
        order_objects::{PayinRequest, PayoutRequest, SignedRequest},
    },
    events::{EventProducers, OrderSettledEvent},
    helpers::{compute_fee, new_order_no},
    traits::{InsertOrderResult, SettlementDatabase, TransitionResult, UpstreamGateway},
    EngineConfig,
};

/// `OrderFlowApi` is the primary API for merchant-facing order flows: creating pay-ins and payouts, querying them,
/// and expiring pay-ins that were never paid.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    config: EngineConfig,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers, config: EngineConfig) -> Self {
        Self { db, gateway, producers, config }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: SettlementDatabase,
    G: UpstreamGateway,
{
    /// Creates a pay-in order and registers it with the provider.
    ///
    /// The request is verified with the merchant's API key before anything is stored. Pay-ins have no balance effect
    /// until the provider confirms them. If the provider refuses the order outright, it is marked failed and
    /// `UpstreamSubmissionFailed` is returned. If we cannot tell whether the provider accepted it, the order stays
    /// pending (a callback may still arrive) and `UpstreamTimeout` is returned.
    pub async fn create_payin(&self, params: &SignedParams) -> Result<Transaction, SettlementError> {
        let request = SignedRequest::new(params);
        let (merchant, gateway) = self.authenticate(&request, SignedMessage::Payin).await?;
        let payin = PayinRequest::try_from(request)?;
        if payin.amount < self.config.min_payin_amount {
            return Err(SettlementError::BelowMinimumAmount {
                amount: payin.amount,
                minimum: self.config.min_payin_amount,
            });
        }
        let (fee, net_amount) = compute_fee(payin.amount, merchant.payin_fee);
        let order = NewTransaction {
            order_no: new_order_no(TransactionType::Payin),
            merchant_id: merchant.id,
            merchant_order_no: payin.merchant_order_no,
            transaction_type: TransactionType::Payin,
            amount: payin.amount,
            fee,
            net_amount,
            currency: gateway.currency.clone(),
            destination: None,
            callback_url: payin.callback_url,
            gateway_id: gateway.id,
            extra: payin.extra,
        };
        let order = match self.db.insert_payin(order).await? {
            InsertOrderResult::Inserted(t) => t,
            InsertOrderResult::AlreadyExists(t) => {
                info!("🔄️📥️ Merchant {} resubmitted pay-in {}", merchant.account_number, t.merchant_order_no);
                return Err(SettlementError::DuplicateOrder(t.order_no));
            },
        };
        info!(
            "🔄️📥️ Pay-in {} created for merchant {}. Amount: {}, fee: {fee}",
            order.order_no, merchant.account_number, order.amount
        );
        match self.gateway.submit_payin(&gateway, &order).await {
            Ok(submitted) => {
                let event = SettlementEvent::submitted(&submitted.provider_order_id, submitted.raw);
                let order = self
                    .db
                    .record_submission(
                        &order.order_no,
                        Some(&submitted.provider_order_id),
                        submitted.payment_url.as_deref(),
                        event,
                    )
                    .await?;
                debug!("🔄️📥️ Pay-in {} registered upstream as {}", order.order_no, submitted.provider_order_id);
                Ok(order)
            },
            Err(e) if e.is_definite_failure() => {
                warn!("🔄️📥️ The provider refused pay-in {}. {e}", order.order_no);
                let event = SettlementEvent::submission_failed(&e.to_string());
                let result = self.db.finalize_transaction(&order.order_no, FinalOutcome::Failed, event).await?;
                self.notify_if_settled(&result).await;
                Err(SettlementError::UpstreamSubmissionFailed { order_no: order.order_no, reason: e.to_string() })
            },
            Err(e) => {
                warn!("🔄️📥️ Pay-in {} may or may not have reached the provider. {e}", order.order_no);
                self.db.append_event(&order.order_no, SettlementEvent::outcome_unknown(&e.to_string())).await?;
                Err(SettlementError::UpstreamTimeout { order_no: order.order_no, reason: e.to_string() })
            },
        }
    }

    /// Creates a payout order and freezes its amount on the merchant's balance, atomically.
    ///
    /// The request is verified with the merchant's payout key. Nothing is sent to the provider until an admin approves
    /// the payout.
    pub async fn create_payout(&self, params: &SignedParams) -> Result<Transaction, SettlementError> {
        let request = SignedRequest::new(params);
        let (merchant, gateway) = self.authenticate(&request, SignedMessage::Payout).await?;
        let payout = PayoutRequest::try_from(request)?;
        if payout.amount < gateway.min_withdrawal {
            return Err(SettlementError::BelowMinimumAmount { amount: payout.amount, minimum: gateway.min_withdrawal });
        }
        if !self.gateway.supports_destination(&gateway, &payout.destination) {
            return Err(SettlementError::InvalidRequest(format!(
                "Gateway {} cannot pay out to a {} destination in {}",
                gateway.code,
                payout.destination.kind(),
                gateway.currency
            )));
        }
        let (fee, net_amount) = compute_fee(payout.amount, merchant.payout_fee);
        let order = NewTransaction {
            order_no: new_order_no(TransactionType::Payout),
            merchant_id: merchant.id,
            merchant_order_no: payout.merchant_order_no,
            transaction_type: TransactionType::Payout,
            amount: payout.amount,
            fee,
            net_amount,
            currency: gateway.currency.clone(),
            destination: Some(payout.destination),
            callback_url: payout.callback_url,
            gateway_id: gateway.id,
            extra: payout.extra,
        };
        match self.db.insert_payout_and_freeze(order).await {
            Ok(InsertOrderResult::Inserted(t)) => {
                info!(
                    "🔄️📤️ Payout {} created for merchant {}. {} frozen, fee: {fee}",
                    t.order_no, merchant.account_number, t.amount
                );
                Ok(t)
            },
            Ok(InsertOrderResult::AlreadyExists(t)) => {
                info!("🔄️📤️ Merchant {} resubmitted payout {}", merchant.account_number, t.merchant_order_no);
                Err(SettlementError::DuplicateOrder(t.order_no))
            },
            Err(e) => {
                debug!("🔄️📤️ Payout for merchant {} was not created. {e}", merchant.account_number);
                Err(e.into())
            },
        }
    }

    /// Looks up one of the merchant's orders by the merchant's own order number. The query is signed like any other
    /// merchant request, with the API key.
    pub async fn order_status(&self, params: &SignedParams) -> Result<Transaction, SettlementError> {
        let request = SignedRequest::new(params);
        let (merchant, _) = self.authenticate(&request, SignedMessage::OrderQuery).await?;
        let merchant_order_no = request.merchant_order_no()?;
        self.db
            .fetch_transaction_by_merchant_order(merchant.id, merchant_order_no)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(merchant_order_no.to_string()))
    }

    /// Marks every pending pay-in older than the configured expiry as failed. Pay-ins never touch the ledger while
    /// pending, so this releases nothing. Payouts are never expired automatically.
    pub async fn expire_payins(&self) -> Result<Vec<Transaction>, SettlementError> {
        let stale = self.db.fetch_stale_payins(self.config.payin_expiry).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            let result =
                self.db.finalize_transaction(&order.order_no, FinalOutcome::Failed, SettlementEvent::expired()).await?;
            self.notify_if_settled(&result).await;
            if let TransitionResult::Applied(t) = result {
                debug!("🔄️🕰️ Pay-in {} expired", t.order_no);
                expired.push(t);
            }
        }
        Ok(expired)
    }

    /// Resolves the merchant and its gateway, and verifies the request signature.
    ///
    /// Pay-ins and order queries are signed with the merchant's API key, payouts with the payout key. The signature
    /// scheme comes from the merchant's gateway.
    async fn authenticate(
        &self,
        request: &SignedRequest<'_>,
        message: SignedMessage,
    ) -> Result<(Merchant, PaymentGateway), SettlementError> {
        let account = request.merchant_account()?;
        let merchant = self
            .db
            .fetch_merchant_by_account(account)
            .await?
            .ok_or_else(|| SettlementError::UnknownMerchant(account.to_string()))?;
        let gateway = self
            .db
            .fetch_gateway(merchant.gateway_id)
            .await?
            .ok_or_else(|| {
                SettlementError::GatewayUnavailable(format!("Gateway #{} is missing", merchant.gateway_id))
            })?;
        let secret = match message {
            SignedMessage::Payout => merchant.payout_secret(),
            _ => merchant.api_key.reveal().as_str(),
        };
        let scheme = gateway.gateway_type.signature_scheme();
        if !scheme.verify_params(message, request.params, secret) {
            warn!("🔐️ Invalid {scheme} signature on a {message:?} request from merchant {account}");
            return Err(SettlementError::InvalidSignature);
        }
        request.require_signed_reference(scheme)?;
        if !merchant.is_active {
            return Err(SettlementError::MerchantInactive(account.to_string()));
        }
        if !gateway.is_active {
            return Err(SettlementError::GatewayUnavailable(format!("Gateway {} is inactive", gateway.code)));
        }
        Ok((merchant, gateway))
    }

    async fn notify_if_settled(&self, result: &TransitionResult) {
        if let TransitionResult::Applied(t) = result {
            self.producers.publish_order_settled(OrderSettledEvent::new(t.clone())).await;
        }
    }
}
