//! # Fee calculation
//!
//! Fees are fixed when an order is created and stored on the order. They are never recomputed, so a later change to a
//! merchant's fee rate leaves historical orders untouched.
//!
//! `fee = round_half_up(amount × rate)`, in minor units. Rates are held in basis points, so this is exact integer
//! arithmetic: `fee = (amount × bps + 5000) / 10000`.
use sg_common::{FeeRate, Money};

const BPS_DENOMINATOR: i128 = 10_000;

/// Returns `(fee, net_amount)` for a non-negative `amount`.
pub fn compute_fee(amount: Money, rate: FeeRate) -> (Money, Money) {
    let scaled = i128::from(amount.value()) * i128::from(rate.bps());
    let fee = (scaled + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR;
    // rate <= 100%, so the fee never exceeds the amount and always fits back into an i64
    #[allow(clippy::cast_possible_truncation)]
    let fee = Money::from_minor(fee as i64);
    (fee, amount - fee)
}
