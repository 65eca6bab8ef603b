//! Significant-digit rate formatting
//!
//! Raw fixed-point rates of low-value tokens carry long runs of leading
//! fractional zeros. These helpers cut them to a bounded number of
//! significant digits so every screen renders the same string.
//!
//! Digits are truncated, never rounded.

use crate::types::pow10;
use ruint::aliases::U256;

/// Significant fractional digits kept once the first non-zero digit is seen
const SIGNIFICANT_DIGITS: usize = 4;

/// Fraction length at which purely fractional values stop scanning early
const SMALL_VALUE_DIGITS: usize = 6;

/// Canonical rendering of a zero rate
const ZERO_RATE: &str = "0.0000";

/// Renders a fixed-point rate with `decimals` digits of precision
///
/// ```
/// use ruint::aliases::U256;
/// use token_rate_sdk::formatter::display_rate;
///
/// let raw = U256::from(1_234_567_890_000_000_000u128);
/// assert_eq!(display_rate(raw, 18), "1.2345");
/// assert_eq!(display_rate(U256::ZERO, 18), "0.0000");
/// ```
pub fn display_rate(raw: U256, decimals: u8) -> String {
    if raw.is_zero() {
        return ZERO_RATE.to_string();
    }
    let scale = pow10(decimals);
    let whole = (raw / scale).to_string();
    let fraction = format!("{:0>width$}", (raw % scale).to_string(), width = decimals as usize);
    cut_significant("", &whole, fraction.trim_end_matches('0'))
}

/// Applies the significant-digit rule to an already formatted decimal string
///
/// Input that is not a plain decimal number is returned unchanged.
pub fn display_rate_str(value: &str) -> String {
    let value = value.trim();
    let (sign, unsigned) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_decimal = !whole.is_empty()
        && whole.bytes().all(|b| b.is_ascii_digit())
        && fraction.bytes().all(|b| b.is_ascii_digit());
    if !is_decimal {
        return value.to_string();
    }
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() && whole.bytes().all(|b| b == b'0') {
        return ZERO_RATE.to_string();
    }
    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    cut_significant(sign, whole, fraction)
}

/// Cuts `fraction` (trailing zeros already removed) to the display precision
fn cut_significant(sign: &str, whole: &str, fraction: &str) -> String {
    if fraction.is_empty() {
        return format!("{}{}.{}", sign, whole, "0".repeat(SIGNIFICANT_DIGITS));
    }

    let whole_is_zero = whole == "0";
    let mut significant = 0;
    for (index, digit) in fraction.bytes().enumerate() {
        let position = index + 1;
        if digit != b'0' || significant > 0 {
            significant += 1;
        }
        if significant == SIGNIFICANT_DIGITS {
            return render(sign, whole, fraction, position);
        }
        if whole_is_zero && position == SMALL_VALUE_DIGITS && significant > 0 {
            return render(sign, whole, fraction, SMALL_VALUE_DIGITS);
        }
    }

    if significant == 0 {
        return render(sign, whole, fraction, SIGNIFICANT_DIGITS);
    }
    render(sign, whole, fraction, fraction.len().max(SIGNIFICANT_DIGITS))
}

/// Renders `whole.fraction` with exactly `digits` fractional digits, truncating or zero-padding
fn render(sign: &str, whole: &str, fraction: &str, digits: usize) -> String {
    let kept = &fraction[..digits.min(fraction.len())];
    format!("{}{}.{:0<width$}", sign, whole, kept, width = digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(value: &str) -> U256 {
        value.parse().unwrap()
    }

    #[test]
    fn test_zero_is_canonical() {
        assert_eq!(display_rate(U256::ZERO, 18), "0.0000");
        assert_eq!(display_rate(U256::ZERO, 0), "0.0000");
        assert_eq!(display_rate(U256::ZERO, 6), "0.0000");
    }

    #[test]
    fn test_integer_values_are_padded() {
        assert_eq!(display_rate(raw("2000000000000000000"), 18), "2.0000");
        assert_eq!(display_rate(raw("42"), 0), "42.0000");
    }

    #[test]
    fn test_four_significant_digits_truncate() {
        assert_eq!(display_rate(raw("1234567890000000000"), 18), "1.2345");
        assert_eq!(display_rate(raw("1239999999999999999"), 18), "1.2399");
        assert_eq!(display_rate(raw("350123456"), 6), "350.1234");
    }

    #[test]
    fn test_leading_zeros_do_not_count() {
        // 0.0012345678
        assert_eq!(display_rate(raw("1234567800000000"), 18), "0.001234");
        // 1.0012345678
        assert_eq!(display_rate(raw("1001234567800000000"), 18), "1.001234");
    }

    #[test]
    fn test_small_values_use_six_digits() {
        // 0.0000012345
        assert_eq!(display_rate(raw("1234500000000"), 18), "0.000001");
        // 0.00001234
        assert_eq!(display_rate(raw("12340000000000"), 18), "0.000012");
    }

    #[test]
    fn test_tiny_values_keep_four_significant_digits() {
        // 0.00000001234567
        assert_eq!(display_rate(raw("12345670000"), 18), "0.00000001234");
    }

    #[test]
    fn test_short_fractions_are_padded() {
        assert_eq!(display_rate(raw("500000000000000000"), 18), "0.5000");
        assert_eq!(display_rate(raw("1250000"), 6), "1.2500");
    }

    #[test]
    fn test_string_overload() {
        assert_eq!(display_rate_str("1.23456789"), "1.2345");
        assert_eq!(display_rate_str("0.0000012345"), "0.000001");
        assert_eq!(display_rate_str("12"), "12.0000");
        assert_eq!(display_rate_str("0.000"), "0.0000");
        assert_eq!(display_rate_str("007.50"), "7.5000");
        assert_eq!(display_rate_str("-0.012345"), "-0.01234");
        assert_eq!(display_rate_str("n/a"), "n/a");
    }
}
