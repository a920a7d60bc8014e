mod money;

pub mod helpers;
pub mod op;
mod secret;
pub mod signature;

pub use money::{FeeRate, Money, MoneyConversionError};
pub use secret::Secret;
pub use signature::{SignatureScheme, SignedMessage, SignedParams, SIGN_FIELD};
