use crate::utils::error::{AppError, Result};

pub const MAX_RATE_PERCENT: f64 = 100.0;

pub fn validate_rate(rate_percent: f64) -> Result<f64> {
    if !rate_percent.is_finite() || !(0.0..=MAX_RATE_PERCENT).contains(&rate_percent) {
        return Err(AppError::validation(
            "commission_rate",
            format!("must be between 0 and {}", MAX_RATE_PERCENT),
        ));
    }
    Ok(rate_percent)
}

/// Commission owed on an order, rounded half away from zero to the cent.
pub fn commission_cents(amount_cents: i64, rate_percent: f64) -> i64 {
    (amount_cents as f64 * rate_percent / 100.0).round() as i64
}
