//! Field validator: normalizes and validates SSN, phone, ZIP, and year.

use chrono::Datelike;
use regex::Regex;
use std::sync::OnceLock;

/// Result of validating a single field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub ok: bool,
    pub normalized: Option<String>,
    pub reason: Option<String>,
}

impl ValidationResult {
    fn valid(normalized: impl Into<String>) -> Self {
        Self {
            ok: true,
            normalized: Some(normalized.into()),
            reason: None,
        }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            normalized: None,
            reason: Some(reason.into()),
        }
    }
}

fn digits_only(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn ssn_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{3}[- ]?\d{2}[- ]?\d{4}$").unwrap())
}

fn zip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{5}(-\d{4})?$").unwrap())
}

/// Validates and normalizes a Social Security Number to `XXX-XX-XXXX`.
///
/// Rejects all-equal digit strings and SSNs whose first triple is `000`,
/// `666`, or in the `900`-`999` range — these are never issued.
pub fn validate_ssn(raw: &str) -> ValidationResult {
    let trimmed = raw.trim();
    if !ssn_regex().is_match(trimmed) {
        return ValidationResult::invalid("not a 9-digit SSN pattern");
    }
    let digits = digits_only(trimmed);
    if digits.len() != 9 {
        return ValidationResult::invalid("not a 9-digit SSN pattern");
    }
    if digits.chars().all(|c| c == digits.chars().next().unwrap()) {
        return ValidationResult::invalid("all digits equal");
    }
    let first_triple = &digits[0..3];
    if first_triple == "000" || first_triple == "666" || first_triple.starts_with('9') {
        return ValidationResult::invalid("invalid area number");
    }
    let normalized = format!("{}-{}-{}", &digits[0..3], &digits[3..5], &digits[5..9]);
    ValidationResult::valid(normalized)
}

/// Validates and normalizes a NANP phone number to `(XXX) XXX-XXXX`.
pub fn validate_phone(raw: &str) -> ValidationResult {
    let trimmed = raw.trim();
    let digits = digits_only(trimmed);
    let ten = if digits.len() == 11 && digits.starts_with('1') {
        digits[1..].to_string()
    } else if digits.len() == 10 {
        digits
    } else {
        return ValidationResult::invalid("not a 10-digit NANP number");
    };
    let normalized = format!("({}) {}-{}", &ten[0..3], &ten[3..6], &ten[6..10]);
    ValidationResult::valid(normalized)
}

/// Validates and normalizes a US ZIP code (`DDDDD` or `DDDDD-DDDD`).
pub fn validate_zip(raw: &str) -> ValidationResult {
    let collapsed: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if !zip_regex().is_match(&collapsed) {
        return ValidationResult::invalid("not a valid ZIP code");
    }
    ValidationResult::valid(collapsed)
}

/// Validates a year is within `[1950, current_year + 1]`.
pub fn validate_year(year: i32) -> ValidationResult {
    let current_year = chrono::Utc::now().year();
    if year < 1950 || year > current_year + 1 {
        return ValidationResult::invalid(format!("year {year} out of range"));
    }
    ValidationResult::valid(year.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_ssn_with_dashes_and_spaces() {
        assert_eq!(validate_ssn("123-45-6789").normalized.unwrap(), "123-45-6789");
        assert_eq!(validate_ssn("123 45 6789").normalized.unwrap(), "123-45-6789");
        assert_eq!(validate_ssn("123456789").normalized.unwrap(), "123-45-6789");
    }

    #[test]
    fn rejects_all_equal_digits() {
        assert!(!validate_ssn("111111111").ok);
    }

    #[test]
    fn rejects_reserved_area_numbers() {
        assert!(!validate_ssn("000-45-6789").ok);
        assert!(!validate_ssn("666-45-6789").ok);
        assert!(!validate_ssn("900-45-6789").ok);
    }

    #[test]
    fn normalizes_phone_with_country_code() {
        let result = validate_phone("1-415-555-0100");
        assert_eq!(result.normalized.unwrap(), "(415) 555-0100");
    }

    #[test]
    fn normalizes_bare_ten_digit_phone() {
        let result = validate_phone("4155550100");
        assert_eq!(result.normalized.unwrap(), "(415) 555-0100");
    }

    #[test]
    fn rejects_short_phone() {
        assert!(!validate_phone("5550100").ok);
    }

    #[test]
    fn normalizes_zip_plus_four_by_stripping_whitespace() {
        assert_eq!(validate_zip("94105-1234").normalized.unwrap(), "94105-1234");
        assert_eq!(validate_zip(" 94105 ").normalized.unwrap(), "94105");
    }

    #[test]
    fn rejects_malformed_zip() {
        assert!(!validate_zip("941").ok);
    }

    #[test]
    fn year_round_trip_matches_invariant_8() {
        let result = validate_year(2024);
        assert!(result.ok);
        assert_eq!(result.normalized.unwrap(), "2024");
    }

    #[test]
    fn rejects_year_outside_range() {
        assert!(!validate_year(1900).ok);
        assert!(!validate_year(3000).ok);
    }
}
