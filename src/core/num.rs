use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_f64(value)
}

pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// `Decimal::MAX` and `Decimal::MIN` stand in for the infinities: saturating
/// arithmetic pins overflowed values there and pricing rejects them.
pub fn is_finite(value: Decimal) -> bool {
    value != Decimal::MAX && value != Decimal::MIN
}

pub fn sign(value: Decimal) -> Decimal {
    if value.is_zero() {
        Decimal::ZERO
    } else if value.is_sign_negative() {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ONE
    }
}

/// Clamps against optional bounds. The upper bound is applied first, so a
/// misconfigured `min > max` resolves to `min`.
pub fn clamp(value: Decimal, min: Option<Decimal>, max: Option<Decimal>) -> Decimal {
    let mut value = value;
    if let Some(max) = max {
        value = value.min(max);
    }
    if let Some(min) = min {
        value = value.max(min);
    }
    value
}

pub fn floor_to_i64(value: Decimal) -> Option<i64> {
    if !is_finite(value) {
        return None;
    }
    value.floor().to_i64()
}
