//! E.164 phone number parsing/validation (`^\+[1-9]\d{1,14}$`).
//!
//! Stored split as `(country_code, base_number)` per §3/§6; `Phone` is the
//! validated, parsed form every dispatch path downstream of the HTTP edge
//! works with, so P8 ("no call-log is ever created with a to-number failing
//! the E.164 regex") holds structurally rather than by convention.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;

/// A validated E.164 number, split into the country calling code and the
/// remaining subscriber digits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub country_code: String,
    pub base_number: String,
}

impl Phone {
    /// Parse and validate a raw `+`-prefixed E.164 string.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        if !is_e164(raw) {
            return Err(AppError::validation(format!(
                "`{raw}` is not a valid E.164 phone number"
            )));
        }
        // Country calling codes are 1-3 digits; without a full numbering-plan
        // table we take the conventional split used across the catalog: 1
        // digit for NANP ('1'), otherwise up to 3, leaving at least 4 digits
        // for the subscriber number (E.164 allows up to 15 digits total).
        let digits = &raw[1..];
        let cc_len = country_code_len(digits);
        let (cc, base) = digits.split_at(cc_len);
        Ok(Phone {
            country_code: cc.to_string(),
            base_number: base.to_string(),
        })
    }

    pub fn e164(&self) -> String {
        format!("+{}{}", self.country_code, self.base_number)
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.e164())
    }
}

pub fn is_e164(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    if bytes.is_empty() || bytes[0] != b'+' {
        return false;
    }
    let digits = &raw[1..];
    if digits.is_empty() || digits.len() > 15 {
        return false;
    }
    let mut chars = digits.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() && c != '0' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_digit())
}

fn country_code_len(digits: &str) -> usize {
    if digits.starts_with('1') {
        1
    } else if digits.len() > 12 {
        digits.len() - 12
    } else {
        digits.len().min(3).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_numbers() {
        assert!(is_e164("+14155552671"));
        assert!(is_e164("+971501234567"));
    }

    #[test]
    fn rejects_missing_plus_and_leading_zero() {
        assert!(!is_e164("14155552671"));
        assert!(!is_e164("+0123456"));
        assert!(!is_e164("12345"));
        assert!(!is_e164("+1a23"));
    }

    #[test]
    fn splits_nanp_country_code() {
        let p = Phone::parse("+14155552671").unwrap();
        assert_eq!(p.country_code, "1");
        assert_eq!(p.base_number, "4155552671");
        assert_eq!(p.e164(), "+14155552671");
    }
}
