//! Risk-percentage position sizing.

/// Size returned when the stop distance is zero or not a finite number.
pub const MIN_SAFE_SIZE: u64 = 1;

/// Relative slack for price differences that land a few ulps off their decimal value.
pub const RISK_TOLERANCE: f64 = 1e-9;

/// Units such that `units * |entry - stop|` does not exceed `balance * risk_fraction`.
///
/// Returns 0 when a single unit would already exceed the risk budget or the balance
/// cannot fund any risk; the caller skips the entry in that case.
pub fn size(balance: f64, risk_fraction: f64, entry: f64, stop: f64) -> u64 {
    let distance = (entry - stop).abs();
    if !distance.is_finite() || distance == 0.0 {
        return MIN_SAFE_SIZE;
    }

    let risk_amount = balance * risk_fraction;
    if !risk_amount.is_finite() || risk_amount <= 0.0 {
        return 0;
    }

    let budget = risk_amount * (1.0 + RISK_TOLERANCE);
    let raw = (budget / distance).floor();
    if raw < 1.0 {
        return 0;
    }

    let mut units = if raw >= u64::MAX as f64 { u64::MAX } else { raw as u64 };
    while units > 0 && units as f64 * distance > budget {
        units -= 1;
    }
    units
}
