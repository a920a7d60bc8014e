use chrono::Duration;
use sg_common::{FeeRate, Money};

/// Tunables for the settlement flows.
///
/// The engine never reads settings from the environment itself. The server builds one of these at start-up and hands
/// it to the APIs that need it, and tests build whatever they like.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Pending pay-ins older than this with no callback are marked as failed.
    pub payin_expiry: Duration,
    /// Smallest pay-in accepted from a merchant.
    pub min_payin_amount: Money,
    /// Fee rates applied to new merchants that do not specify their own.
    pub default_payin_fee: FeeRate,
    pub default_payout_fee: FeeRate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            payin_expiry: Duration::hours(24),
            min_payin_amount: Money::from_major(1),
            default_payin_fee: FeeRate::default(),
            default_payout_fee: FeeRate::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_payin_expiry(mut self, expiry: Duration) -> Self {
        self.payin_expiry = expiry;
        self
    }

    pub fn with_min_payin_amount(mut self, amount: Money) -> Self {
        self.min_payin_amount = amount;
        self
    }

    pub fn with_default_fees(mut self, payin_fee: FeeRate, payout_fee: FeeRate) -> Self {
        self.default_payin_fee = payin_fee;
        self.default_payout_fee = payout_fee;
        self
    }
}
