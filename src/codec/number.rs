//! Decimal formatting for number attributes.

/// Maximum digits kept after the decimal point.
const MAX_FRACTION_DIGITS: usize = 7;

/// Floats this close to a whole number are written without a fraction.
const INTEGRAL_EPSILON: f64 = 1e-12;

/// Formats a float as a plain decimal string, never in exponent notation.
///
/// Values within `1e-12` of their truncation are written as integers,
/// everything else with at most seven fractional digits and `.` as separator.
/// Non-finite values keep their Rust spelling; `encode` never passes them.
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let whole = value.trunc();
    if (value - whole).abs() < INTEGRAL_EPSILON && whole.abs() < i64::MAX as f64 {
        return (whole as i64).to_string();
    }

    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, value);
    let trimmed = match fixed.find('.') {
        Some(_) => fixed.trim_end_matches('0').trim_end_matches('.'),
        None => fixed.as_str(),
    };

    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
