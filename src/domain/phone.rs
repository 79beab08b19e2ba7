//! Mobile-money phone number checks.
//!
//! Subscribers type numbers in whatever local form they are used to
//! (`0712 345 678`, `+254712345678`, `254712345678`, `712345678`). The gateway
//! only accepts the international digits-only form, `254712345678`.

use crate::error::{PaymentError, Result};
use serde::Serialize;
use std::fmt;

pub const COUNTRY_CODE: &str = "254";
const TRUNK_PREFIX: char = '0';
const MOBILE_PREFIXES: [char; 2] = ['7', '1'];
const SUBSCRIBER_DIGITS: usize = 8;

fn compact(phone: &str) -> String {
    phone.chars().filter(|c| !c.is_whitespace()).collect()
}

fn national_part(compact: &str) -> &str {
    if let Some(rest) = compact.strip_prefix('+') {
        // A bare '+' must be followed by the country code.
        return rest.strip_prefix(COUNTRY_CODE).unwrap_or(compact);
    }
    compact
        .strip_prefix(COUNTRY_CODE)
        .or_else(|| compact.strip_prefix(TRUNK_PREFIX))
        .unwrap_or(compact)
}

/// Returns true when `phone` is a recognised mobile number in any accepted
/// local or international form.
pub fn is_valid(phone: &str) -> bool {
    let compact = compact(phone);
    let national = national_part(&compact);

    let mut chars = national.chars();
    match chars.next() {
        Some(first) if MOBILE_PREFIXES.contains(&first) => {}
        _ => return false,
    }
    national.len() == SUBSCRIBER_DIGITS + 1 && chars.all(|c| c.is_ascii_digit())
}

/// Rewrites a phone number into the gateway's `254XXXXXXXXX` form.
///
/// Only meaningful for input that passed [`is_valid`]; anything else is
/// returned with whitespace removed but otherwise untouched.
pub fn normalize(phone: &str) -> String {
    let compact = compact(phone);
    let digits = compact.strip_prefix('+').unwrap_or(&compact);

    if let Some(rest) = digits.strip_prefix(TRUNK_PREFIX) {
        return format!("{COUNTRY_CODE}{rest}");
    }
    let is_bare_national = digits.len() == SUBSCRIBER_DIGITS + 1
        && digits.starts_with(MOBILE_PREFIXES.as_slice());
    if is_bare_national {
        return format!("{COUNTRY_CODE}{digits}");
    }
    digits.to_string()
}

/// A validated phone number, stored in normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "Please enter your mobile money phone number".to_string(),
            ));
        }
        if !is_valid(raw) {
            return Err(PaymentError::ValidationError(
                "Invalid phone number, use the format 07XXXXXXXX".to_string(),
            ));
        }
        Ok(Self(normalize(raw)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Keeps the country code and last four digits, for logs.
    pub fn masked(&self) -> String {
        let keep_tail = 4;
        let head = COUNTRY_CODE.len() + 1;
        if self.0.len() <= head + keep_tail {
            return "*".repeat(self.0.len());
        }
        let hidden = self.0.len() - head - keep_tail;
        format!(
            "{}{}{}",
            &self.0[..head],
            "*".repeat(hidden),
            &self.0[self.0.len() - keep_tail..]
        )
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_local_and_international_forms() {
        for phone in [
            "0712345678",
            "0112345678",
            "+254712345678",
            "254712345678",
            "712345678",
            "0712 345 678",
            " +254 712 345 678 ",
        ] {
            assert!(is_valid(phone), "{phone} should be valid");
        }
    }

    #[test]
    fn test_rejects_malformed_numbers() {
        for phone in [
            "",
            "123",
            "0812345678",
            "071234567",
            "07123456789",
            "07123456a8",
            "+712345678",
            "+0712345678",
            "2540712345678",
            "0712-345-678",
        ] {
            assert!(!is_valid(phone), "{phone} should be invalid");
        }
    }

    #[test]
    fn test_normalize_rewrites_to_country_code() {
        assert_eq!(normalize("0712345678"), "254712345678");
        assert_eq!(normalize("+254712345678"), "254712345678");
        assert_eq!(normalize("254712345678"), "254712345678");
        assert_eq!(normalize("712345678"), "254712345678");
        assert_eq!(normalize("0712 345 678"), "254712345678");
        assert_eq!(normalize("0112345678"), "254112345678");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for phone in ["0712345678", "+254712345678", "712345678", "0112 345 678"] {
            let once = normalize(phone);
            assert_eq!(normalize(&once), once);
            assert!(is_valid(&once));
        }
    }

    #[test]
    fn test_phone_number_parse() {
        let phone = PhoneNumber::parse("0712345678").unwrap();
        assert_eq!(phone.as_str(), "254712345678");
        assert_eq!(phone.masked(), "2547****5678");

        assert!(matches!(
            PhoneNumber::parse("123"),
            Err(PaymentError::ValidationError(_))
        ));
        assert!(matches!(
            PhoneNumber::parse("   "),
            Err(PaymentError::ValidationError(_))
        ));
    }
}
