//! Decimal helpers shared by every pricing pass.
//!
//! Values are carried at full precision through a computation and rounded
//! once, at the end, with [`round_money`].

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places for monetary outputs.
pub const MONEY_SCALE: u32 = 2;

/// Round a monetary amount half-away-from-zero to [`MONEY_SCALE`] places.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// `value × percent / 100`, unrounded.
pub fn percent_of(value: Decimal, percent: Decimal) -> Decimal {
    value * percent / Decimal::ONE_HUNDRED
}

/// `part / whole × 100`, rounded to 2 places; zero when `whole` is not positive.
pub fn ratio_percent(part: Decimal, whole: Decimal) -> Decimal {
    if whole <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(part / whole * Decimal::ONE_HUNDRED)
}
