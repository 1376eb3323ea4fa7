//! Utility functions and helpers

/// Tolerance for comparing percentage changes against thresholds.
/// Absorbs binary rounding, e.g. 4550 -> 4586.4 evaluates to 0.79999...
pub const PCT_EPSILON: f64 = 1e-9;

/// Calculate percentage change. Returns `None` when `old_value` is not a
/// usable baseline.
pub fn calculate_percentage_change(old_value: f64, new_value: f64) -> Option<f64> {
    if old_value > 0.0 && old_value.is_finite() && new_value.is_finite() {
        Some(((new_value - old_value) / old_value) * 100.0)
    } else {
        None
    }
}

/// Format a price with two decimals
pub fn format_price(value: f64) -> String {
    format!("{:.2}", value)
}

/// Format a signed percentage, e.g. `+0.80%`
pub fn format_pct(value: f64) -> String {
    format!("{:+.2}%", value)
}
