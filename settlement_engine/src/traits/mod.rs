//! #  Database management and control.
//!
//! This module provides the interfaces that define the interface contracts of the settlement engine database
//! *backends*.
//!
//! ## Merchants and gateways
//! A merchant holds two balances: `balance` (spendable) and `frozen_balance` (reserved for payouts that have not
//! settled yet). Each merchant routes its orders through one gateway profile, which decides how requests are signed
//! and which provider API is called.
//!
//! ## Traits
//! The module defines behavior that database backends need to expose in order to be supported by the settlement
//! engine.
//!
//! * [`SettlementDatabase`] defines the order lifecycle and the only operations that may move money.
//! * [`MerchantManagement`] handles onboarding and queries for merchants and gateways.
//! * [`UpstreamGateway`] is the seam to the third-party provider. It is not a database trait, but the engine APIs are
//!   generic over it in the same way.
mod merchant_management;
mod settlement_database;
mod upstream_gateway;

mod data_objects;

pub use data_objects::{InsertOrderResult, TransitionResult};
pub use merchant_management::{MerchantApiError, MerchantManagement};
pub use settlement_database::{SettlementDatabase, SettlementDbError};
pub use upstream_gateway::{
    CallbackOutcome,
    CallbackTranslation,
    PayinSubmitted,
    PayoutSubmitted,
    UpstreamError,
    UpstreamGateway,
};
