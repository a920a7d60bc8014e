//! Helpers for tests in this crate and in crates that build on it. Enabled with the `test_utils` feature.
pub mod fake_upstream;
pub mod prepare_env;
pub mod requests;
