//! Fixed-point display of integer wei amounts.

/// Formats `value / 10^decimals` with exactly `digits` fraction digits, rounding half-up.
///
/// The computation stays in integers, so the output is exact for every `u128`.
pub fn format_units_half_up(value: u128, decimals: u32, digits: u32) -> String {
    let (quotient, digits) = if digits >= decimals {
        (value * 10u128.pow(digits - decimals), digits)
    } else {
        let scale = 10u128.pow(decimals - digits);
        let (quotient, remainder) = (value / scale, value % scale);
        let round_up = remainder >= scale - remainder;
        (quotient + u128::from(round_up), digits)
    };

    let unit = 10u128.pow(digits);
    let (integer, fraction) = (quotient / unit, quotient % unit);
    if digits == 0 {
        integer.to_string()
    } else {
        format!("{integer}.{fraction:0width$}", width = digits as usize)
    }
}
