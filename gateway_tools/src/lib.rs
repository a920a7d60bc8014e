//! Clients for the upstream settlement providers.
//!
//! Each provider type has its own request shape, signature scheme and response envelope; [`GatewayApi`] hides those
//! behind `submit_payin`, `submit_payout` and `parse_callback`.
mod api;
mod config;
mod error;
mod providers;

mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::{GatewayConfig, DEFAULT_GATEWAY_TIMEOUT};
pub use data_objects::{
    AccountKind,
    CallbackOutcome,
    PayinRequest,
    PayinSubmission,
    PayoutAccount,
    PayoutRequest,
    PayoutSubmission,
    ProviderCallback,
    ProviderType,
};
pub use error::GatewayApiError;
