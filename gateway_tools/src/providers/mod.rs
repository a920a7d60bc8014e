pub mod bank_transfer;
pub mod unified_api;
