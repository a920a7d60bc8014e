//! # Settlement gateway server
//! This crate hosts the HTTP front end of the settlement gateway. It is responsible for:
//! * Accepting signed pay-in and payout requests from merchants and handing them to the settlement engine.
//! * Receiving provider webhooks and applying them, exactly once, to the ledger.
//! * The admin payout workflow (approve, reject and manual resolution), protected by an HMAC signature.
//! * Telling merchants about final order statuses, with retries.
//! * Expiring pay-ins that the provider never confirmed.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /payin`, `POST /payout`: merchant order creation.
//! * `GET /order/{account_number}/{merchant_order_no}`: merchant order status queries.
//! * `POST /callback/{gateway_code}`: provider webhooks.
//! * `/api/admin/...`: payout processing, order and merchant lookups and manual credits.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod notifier;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
