use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sg_common::Money;
use thiserror::Error;

use crate::db_types::{Destination, FinalOutcome, OrderNo, PaymentGateway, Transaction};

#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The provider answered and refused the order.
    #[error("The provider rejected the order. {0}")]
    Rejected(String),
    /// The request never reached the provider.
    #[error("Could not reach the provider. {0}")]
    Network(String),
    /// The request may or may not have been accepted (timeouts, 5xx responses, unreadable replies).
    #[error("The provider outcome is unknown. {0}")]
    OutcomeUnknown(String),
    #[error("The destination is not supported by this gateway. {0}")]
    Unsupported(String),
    #[error("Invalid callback. {0}")]
    InvalidCallback(String),
    #[error("The callback signature is invalid")]
    SignatureInvalid,
}

impl UpstreamError {
    /// True when we know for certain that the provider did not accept the order, so any frozen funds can be released.
    pub fn is_definite_failure(&self) -> bool {
        matches!(self, UpstreamError::Rejected(_) | UpstreamError::Network(_) | UpstreamError::Unsupported(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayinSubmitted {
    pub provider_order_id: String,
    /// Where the end customer completes the payment, if the provider hosts a payment page.
    pub payment_url: Option<String>,
    pub raw: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutSubmitted {
    pub provider_order_id: String,
    pub raw: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackOutcome {
    Success,
    Failed,
    /// An intermediate report. It is logged but does not move the order.
    Processing,
}

impl CallbackOutcome {
    pub fn final_outcome(&self) -> Option<FinalOutcome> {
        match self {
            CallbackOutcome::Success => Some(FinalOutcome::Success),
            CallbackOutcome::Failed => Some(FinalOutcome::Failed),
            CallbackOutcome::Processing => None,
        }
    }
}

impl Display for CallbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackOutcome::Success => write!(f, "success"),
            CallbackOutcome::Failed => write!(f, "failed"),
            CallbackOutcome::Processing => write!(f, "processing"),
        }
    }
}

/// A verified provider callback, expressed in our own terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackTranslation {
    pub order_no: OrderNo,
    pub provider_order_id: Option<String>,
    /// The amount the provider reports, when it reports one.
    pub amount: Option<Money>,
    pub outcome: CallbackOutcome,
    pub raw: Value,
}

/// The outbound seam to the third-party settlement provider.
///
/// Implementations translate orders into provider requests, sign them with the gateway's secrets, and classify the
/// responses. The engine only ever reasons about [`UpstreamError::is_definite_failure`]. Anything that is not a
/// definite failure leaves funds frozen.
#[allow(async_fn_in_trait)]
pub trait UpstreamGateway: Clone {
    async fn submit_payin(
        &self,
        gateway: &PaymentGateway,
        order: &Transaction,
    ) -> Result<PayinSubmitted, UpstreamError>;

    async fn submit_payout(
        &self,
        gateway: &PaymentGateway,
        order: &Transaction,
    ) -> Result<PayoutSubmitted, UpstreamError>;

    /// Verifies the callback signature with the gateway's secret and extracts the outcome.
    fn translate_callback(&self, gateway: &PaymentGateway, payload: &Value)
        -> Result<CallbackTranslation, UpstreamError>;

    /// Whether the gateway can pay out to this kind of destination in its currency.
    fn supports_destination(&self, gateway: &PaymentGateway, destination: &Destination) -> bool;
}
