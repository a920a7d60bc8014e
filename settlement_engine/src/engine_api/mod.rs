//! # Settlement engine public API
//!
//! The `engine_api` module exposes the programmatic API for the settlement engine. The API is modular, so that
//! clients can pick and choose the functionality they want.
//!
//! * [`order_flow_api`] handles merchant requests: signed pay-in and payout creation, order status queries, and pay-in
//!   expiry.
//! * [`payout_api`] is the admin payout workflow: approve (dispatch to the provider), reject, and manual resolution.
//! * [`callback_api`] ingests provider webhooks idempotently.
//! * [`merchant_api`] manages merchants and gateway profiles.
//!
//! # API usage
//!
//! Every API is created from a database backend and, where the provider is involved, an [`crate::UpstreamGateway`]
//! implementation:
//!
//! ```rust,ignore
//! use settlement_engine::{events::EventProducers, EngineConfig, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = OrderFlowApi::new(db, my_upstream, EventProducers::default(), EngineConfig::default());
//! let order = api.create_payout(&signed_params).await?;
//! ```

pub mod callback_api;
pub mod errors;
pub mod merchant_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod payout_api;
