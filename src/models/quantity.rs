use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Number of fractional digits two quantities must agree on to count as equal.
///
/// Comparisons round the *difference* to the precision and compare that with
/// zero, so `10 - 9.99996` is zero at four digits while `10 - 9.9999` is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QtyPrecision {
    digits: u32,
}

impl QtyPrecision {
    pub const fn new(digits: u32) -> Self {
        Self { digits }
    }

    pub fn digits(&self) -> u32 {
        self.digits
    }

    pub fn round(&self, qty: Decimal) -> Decimal {
        qty.round_dp_with_strategy(self.digits, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Rounds toward zero, so the result never exceeds `qty` in magnitude.
    pub fn truncate(&self, qty: Decimal) -> Decimal {
        qty.round_dp_with_strategy(self.digits, RoundingStrategy::ToZero)
    }

    pub fn compare(&self, lhs: Decimal, rhs: Decimal) -> Ordering {
        self.round(lhs - rhs).cmp(&Decimal::ZERO)
    }

    pub fn is_zero(&self, qty: Decimal) -> bool {
        self.compare(qty, Decimal::ZERO) == Ordering::Equal
    }

    pub fn is_positive(&self, qty: Decimal) -> bool {
        self.compare(qty, Decimal::ZERO) == Ordering::Greater
    }
}

impl Default for QtyPrecision {
    fn default() -> Self {
        Self::new(4)
    }
}
