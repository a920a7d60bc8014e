//! Settlement Engine
//!
//! The settlement engine is the core of a multi-tenant payment gateway. Merchants create pay-in (deposit) and payout
//! (withdrawal) orders against a ledger balance, admins approve or reject payouts, and a third-party provider moves the
//! money and reports back through webhooks. This library holds all of that logic. It knows nothing about HTTP.
//!
//! The library is divided into these main sections:
//! 1. Storage ([`mod@traits`] and [`mod@sqlite`]). The traits define what a backend must provide; SQLite is the
//!    supported backend. Balances only ever move through four atomic ledger operations, and order status changes are
//!    compare-and-set updates, so concurrent requests cannot double-spend or double-settle.
//! 2. The public API ([`mod@engine_api`]): order creation, the payout approval workflow, callback ingestion and
//!    merchant management.
//!
//! The engine also emits events when an order settles or a payout is handed to the provider. A simple actor framework
//! ([`mod@events`]) lets you hook into them, e.g. to notify merchants.
pub mod db_types;
pub mod engine_api;
mod engine_config;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use engine_api::{
    callback_api::{CallbackApi, CallbackResult},
    errors::SettlementError,
    merchant_api::MerchantApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    payout_api::PayoutApi,
};
pub use engine_config::EngineConfig;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{
    InsertOrderResult,
    MerchantManagement,
    SettlementDatabase,
    TransitionResult,
    UpstreamError,
    UpstreamGateway,
};
