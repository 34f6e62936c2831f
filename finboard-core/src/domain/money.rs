//! Decimal scale rules for stored values

use rust_decimal::{Decimal, RoundingStrategy};

/// Places kept for balances, amounts, values and prices
pub const MONEY_SCALE: u32 = 2;

/// Places kept for holding quantities
pub const QUANTITY_SCALE: u32 = 6;

/// Rescale to exactly two places, so `1000` becomes `1000.00`
pub fn money(value: Decimal) -> Decimal {
    let mut value =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    value.rescale(MONEY_SCALE);
    value
}

/// Round to at most six places and drop trailing zeros
pub fn quantity(value: Decimal) -> Decimal {
    value.round_dp(QUANTITY_SCALE).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_pads_and_rounds() {
        assert_eq!(money(Decimal::new(1000, 0)).to_string(), "1000.00");
        assert_eq!(money(Decimal::new(505, 1)).to_string(), "50.50");
        assert_eq!(money(Decimal::new(12345, 3)).to_string(), "12.35");
    }

    #[test]
    fn test_quantity_normalized() {
        assert_eq!(quantity(Decimal::new(10_000_000, 6)).to_string(), "10");
        assert_eq!(quantity(Decimal::new(15, 1)).to_string(), "1.5");
        assert_eq!(quantity(Decimal::new(1_234_567_891, 9)).to_string(), "1.234568");
    }
}
