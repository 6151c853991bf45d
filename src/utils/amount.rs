//! # Amount Parsing
//!
//! Conversions from request strings into the token's numeric domains.
//! Plain token amounts are unsigned integers in base units; ETH amounts are
//! positive decimals scaled by 10^18 into wei.

use crate::orchestrator::OperationError;
use crate::utils::constants::{ETH_DECIMALS, TOKEN_MAX_AMOUNT};
use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};

/// Parses a non-negative integer amount in the token's base unit.
pub fn parse_token_amount(raw: &str) -> Result<u128, OperationError> {
    let value = parse_unsigned(raw)?;
    to_token_amount(value)
}

/// Same as [`parse_token_amount`], but zero is rejected.
pub fn parse_positive_token_amount(raw: &str) -> Result<u128, OperationError> {
    let value = parse_token_amount(raw)?;
    if value == 0 {
        return Err(OperationError::InvalidArgument(
            "--value must be positive".to_string(),
        ));
    }
    Ok(value)
}

/// Converts a decimal ETH string (e.g. `0.25`) into wei.
pub fn parse_ether(raw: &str) -> Result<u128, OperationError> {
    let invalid = || OperationError::InvalidArgument("--value must be a positive number".to_string());

    let trimmed = raw.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > ETH_DECIMALS {
        return Err(OperationError::InvalidArgument(format!(
            "--value has more than {} decimal places",
            ETH_DECIMALS
        )));
    }

    let mut digits = String::with_capacity(whole.len() + ETH_DECIMALS);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat('0').take(ETH_DECIMALS - fraction.len()));

    let wei = BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(invalid)?;
    if wei.is_zero() {
        return Err(invalid());
    }
    to_token_amount(wei)
}

/// Renders a wei amount back as a decimal ETH string without trailing zeros.
pub fn format_ether(wei: u128) -> String {
    let scale = 10u128.pow(ETH_DECIMALS as u32);
    let whole = wei / scale;
    let fraction = wei % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let padded = format!("{:0width$}", fraction, width = ETH_DECIMALS);
    format!("{}.{}", whole, padded.trim_end_matches('0'))
}

fn parse_unsigned(raw: &str) -> Result<BigUint, OperationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(OperationError::InvalidArgument(
            "--value must be integer".to_string(),
        ));
    }
    BigUint::parse_bytes(trimmed.as_bytes(), 10)
        .ok_or_else(|| OperationError::InvalidArgument("--value must be integer".to_string()))
}

fn to_token_amount(value: BigUint) -> Result<u128, OperationError> {
    match value.to_u128() {
        Some(v) if v <= TOKEN_MAX_AMOUNT => Ok(v),
        _ => Err(OperationError::AmountOverflow(value.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_amounts() {
        assert_eq!(parse_token_amount("100").unwrap(), 100);
        assert_eq!(parse_token_amount(" 0 ").unwrap(), 0);
        assert!(matches!(
            parse_token_amount("12abc"),
            Err(OperationError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_token_amount("-5"),
            Err(OperationError::InvalidArgument(_))
        ));
        assert!(matches!(
            parse_token_amount("1.5"),
            Err(OperationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_positive_amount_rejects_zero() {
        assert!(matches!(
            parse_positive_token_amount("0"),
            Err(OperationError::InvalidArgument(_))
        ));
        assert_eq!(parse_positive_token_amount("7").unwrap(), 7);
    }

    #[test]
    fn test_u128_boundary() {
        let max = u128::MAX.to_string();
        assert_eq!(parse_token_amount(&max).unwrap(), u128::MAX);
        // 2^128
        assert!(matches!(
            parse_token_amount("340282366920938463463374607431768211456"),
            Err(OperationError::AmountOverflow(_))
        ));
    }

    #[test]
    fn test_parse_ether() {
        assert_eq!(parse_ether("1").unwrap(), 1_000_000_000_000_000_000);
        assert_eq!(parse_ether("0.1").unwrap(), 100_000_000_000_000_000);
        assert_eq!(parse_ether(".5").unwrap(), 500_000_000_000_000_000);
        assert_eq!(parse_ether("0.000000000000000001").unwrap(), 1);
        assert!(parse_ether("0").is_err());
        assert!(parse_ether("abc").is_err());
        assert!(parse_ether("-1").is_err());
        assert!(parse_ether("1e3").is_err());
        assert!(parse_ether("0.0000000000000000001").is_err());
    }

    #[test]
    fn test_parse_ether_overflow() {
        // ~3.4e20 ETH is already past 2^128 wei
        assert!(matches!(
            parse_ether("340282366920938463464"),
            Err(OperationError::AmountOverflow(_))
        ));
        assert!(parse_ether("340282366920938463463").is_ok());
    }

    #[test]
    fn test_format_ether() {
        assert_eq!(format_ether(1_000_000_000_000_000_000), "1");
        assert_eq!(format_ether(100_000_000_000_000_000), "0.1");
        assert_eq!(format_ether(1), "0.000000000000000001");
    }
}
