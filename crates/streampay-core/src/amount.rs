//! Fixed-point conversion between human decimal amounts and smallest units.
//!
//! Parsing truncates extra fractional digits toward zero so a submitted amount
//! never exceeds what was typed. No floating point is involved at any step:
//! equality guards reject even a one-unit discrepancy.

use crate::{MICRO_PER_TOKEN, TOKEN_DECIMALS};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount must not be negative")]
    Negative,
    #[error("invalid character {0:?} in amount")]
    InvalidCharacter(char),
    #[error("amount has no digits")]
    NoDigits,
    #[error("amount has more than one decimal point")]
    MultipleDecimalPoints,
    #[error("amount does not fit in 128 bits of smallest units")]
    Overflow,
}

/// Parse a decimal token amount ("12", "0.5", "1.9999995") into smallest units.
///
/// Digits beyond [`TOKEN_DECIMALS`] are dropped, not rounded.
pub fn parse_amount(input: &str) -> Result<u128, AmountError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AmountError::Empty);
    }
    if trimmed.starts_with('-') {
        return Err(AmountError::Negative);
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => {
            if f.contains('.') {
                return Err(AmountError::MultipleDecimalPoints);
            }
            (i, f)
        }
        None => (unsigned, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(AmountError::Empty);
    }
    if let Some(c) = int_part
        .chars()
        .chain(frac_part.chars())
        .find(|c| !c.is_ascii_digit() && *c != '_')
    {
        return Err(AmountError::InvalidCharacter(c));
    }
    if !int_part.chars().chain(frac_part.chars()).any(|c| c.is_ascii_digit()) {
        return Err(AmountError::NoDigits);
    }

    let mut whole: u128 = 0;
    for c in int_part.chars().filter(|c| *c != '_') {
        whole = whole
            .checked_mul(10)
            .and_then(|w| w.checked_add(digit(c)))
            .ok_or(AmountError::Overflow)?;
    }

    let mut fraction: u128 = 0;
    let mut taken = 0u32;
    for c in frac_part.chars().filter(|c| *c != '_') {
        if taken == TOKEN_DECIMALS {
            break;
        }
        fraction = fraction * 10 + digit(c);
        taken += 1;
    }
    fraction *= 10u128.pow(TOKEN_DECIMALS - taken);

    whole
        .checked_mul(MICRO_PER_TOKEN)
        .and_then(|w| w.checked_add(fraction))
        .ok_or(AmountError::Overflow)
}

fn digit(c: char) -> u128 {
    (c as u8 - b'0') as u128
}

/// Exact decimal rendering of a smallest-unit amount, always with
/// [`TOKEN_DECIMALS`] fractional digits ("1.999999", "0.000001").
pub fn format_amount(micro: u128) -> String {
    format!(
        "{}.{:0width$}",
        micro / MICRO_PER_TOKEN,
        micro % MICRO_PER_TOKEN,
        width = TOKEN_DECIMALS as usize
    )
}

/// Same as [`format_amount`] but truncated to `places` fractional digits.
pub fn format_amount_short(micro: u128, places: usize) -> String {
    let full = format_amount(micro);
    let places = places.min(TOKEN_DECIMALS as usize);
    match full.split_once('.') {
        Some((whole, _)) if places == 0 => whole.to_string(),
        Some((whole, frac)) => format!("{}.{}", whole, &frac[..places]),
        None => full,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_tokens() {
        assert_eq!(parse_amount("12").unwrap(), 12_000_000);
        assert_eq!(parse_amount("0").unwrap(), 0);
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_amount("0.5").unwrap(), 500_000);
        assert_eq!(parse_amount(".25").unwrap(), 250_000);
        assert_eq!(parse_amount("3.").unwrap(), 3_000_000);
        assert_eq!(parse_amount("0.000001").unwrap(), 1);
    }

    #[test]
    fn test_parse_truncates_not_rounds() {
        assert_eq!(parse_amount("1.9999995").unwrap(), 1_999_999);
        assert_eq!(parse_amount("0.0000009").unwrap(), 0);
    }

    #[test]
    fn test_parse_accepts_separators_and_whitespace() {
        assert_eq!(parse_amount(" 1_000.5 ").unwrap(), 1_000_500_000);
        assert_eq!(parse_amount("+2").unwrap(), 2_000_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_amount(""), Err(AmountError::Empty));
        assert_eq!(parse_amount("."), Err(AmountError::Empty));
        assert_eq!(parse_amount("-1"), Err(AmountError::Negative));
        assert_eq!(parse_amount("1.2.3"), Err(AmountError::MultipleDecimalPoints));
        assert_eq!(parse_amount("1e6"), Err(AmountError::InvalidCharacter('e')));
        assert_eq!(parse_amount("_"), Err(AmountError::NoDigits));
        assert_eq!(parse_amount("_._"), Err(AmountError::NoDigits));
        assert_eq!(parse_amount("+_."), Err(AmountError::NoDigits));
    }

    #[test]
    fn test_parse_overflow() {
        let too_big = "340282366920938463463374607431768211455";
        assert_eq!(parse_amount(too_big), Err(AmountError::Overflow));
    }

    #[test]
    fn test_format_exact() {
        assert_eq!(format_amount(1_999_999), "1.999999");
        assert_eq!(format_amount(1), "0.000001");
        assert_eq!(format_amount(0), "0.000000");
        assert_eq!(format_amount(700_000), "0.700000");
    }

    #[test]
    fn test_format_short_truncates() {
        assert_eq!(format_amount_short(1_999_999, 2), "1.99");
        assert_eq!(format_amount_short(50_000, 0), "0");
        assert_eq!(format_amount_short(50_000, 9), "0.050000");
    }

    #[test]
    fn test_format_then_parse_is_identity() {
        for x in [0u128, 1, 999_999, 1_000_000, 123_456_789_012] {
            assert_eq!(parse_amount(&format_amount(x)).unwrap(), x);
        }
    }
}
