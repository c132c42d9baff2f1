//! Confidence scorer: a deterministic, additive formula over a BorrowerRecord.

use crate::models::{AccountType, BorrowerRecord};
use crate::pipeline::validation::{validate_ssn, validate_year, validate_zip};

const BASE: f64 = 0.50;
const REQUIRED_FIELD_BONUS: f64 = 0.10;
const REQUIRED_FIELD_CAP: f64 = 0.20;
const OPTIONAL_LIST_BONUS: f64 = 0.05;
const OPTIONAL_LIST_CAP: f64 = 0.15;
const MULTI_SOURCE_BONUS: f64 = 0.10;
const FORMAT_VALIDATION_BONUS: f64 = 0.15;
const NEEDS_REVIEW_THRESHOLD: f64 = 0.70;

/// Computes the confidence score for a record and returns whether it should
/// be flagged for review (score below 0.70).
pub fn score(record: &BorrowerRecord) -> (f64, bool) {
    let mut total = BASE;

    let mut required_bonus = 0.0;
    if !record.full_name.trim().is_empty() {
        required_bonus += REQUIRED_FIELD_BONUS;
    }
    if record.address.is_some() {
        required_bonus += REQUIRED_FIELD_BONUS;
    }
    total += required_bonus.min(REQUIRED_FIELD_CAP);

    let mut optional_bonus = 0.0;
    if !record.income_history.is_empty() {
        optional_bonus += OPTIONAL_LIST_BONUS;
    }
    let has_bank = record
        .account_numbers
        .iter()
        .any(|a| a.account_type == AccountType::Bank);
    let has_loan = record
        .account_numbers
        .iter()
        .any(|a| a.account_type == AccountType::Loan);
    if has_bank {
        optional_bonus += OPTIONAL_LIST_BONUS;
    }
    if has_loan {
        optional_bonus += OPTIONAL_LIST_BONUS;
    }
    total += optional_bonus.min(OPTIONAL_LIST_CAP);

    if record.sources.len() >= 2 {
        total += MULTI_SOURCE_BONUS;
    }

    if passes_all_format_validation(record) {
        total += FORMAT_VALIDATION_BONUS;
    }

    let clamped = total.clamp(0.0, 1.0);
    let needs_review = clamped < NEEDS_REVIEW_THRESHOLD;
    (clamped, needs_review)
}

/// Requires a present, valid SSN; phone/ZIP are only checked when present,
/// and every income year must be valid.
fn passes_all_format_validation(record: &BorrowerRecord) -> bool {
    match &record.raw_ssn {
        Some(ssn) if validate_ssn(ssn).ok => {}
        _ => return false,
    }
    if let Some(phone) = &record.phone {
        if !validate_phone_if_present(phone) {
            return false;
        }
    }
    if let Some(zip) = &record.zip {
        if !validate_zip(zip).ok {
            return false;
        }
    }
    record
        .income_history
        .iter()
        .all(|income| validate_year(income.year).ok)
}

fn validate_phone_if_present(phone: &str) -> bool {
    crate::pipeline::validation::validate_phone(phone).ok
}

/// Applies [`score`] to a record in place, clamping and setting
/// `needs_review`.
pub fn apply(record: &mut BorrowerRecord) {
    let (score, needs_review) = score(record);
    record.confidence_score = score;
    record.needs_review = needs_review;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountNumber, IncomePeriod, IncomeRecord, IncomeSourceType, Money};

    #[test]
    fn bare_minimum_record_scores_base_and_needs_review() {
        let record = BorrowerRecord::new("");
        let (score, needs_review) = score(&record);
        assert_eq!(score, 0.50);
        assert!(needs_review);
    }

    #[test]
    fn name_and_address_cap_required_bonus_at_point_two() {
        let mut record = BorrowerRecord::new("Jane Doe");
        record.address = Some(serde_json::json!({"line1": "1 Main St"}));
        let (score, _) = score(&record);
        assert!((score - 0.70).abs() < 1e-9);
    }

    #[test]
    fn full_record_with_sources_and_valid_fields_scores_high() {
        let mut record = BorrowerRecord::new("Jane Doe");
        record.address = Some(serde_json::json!({"line1": "1 Main St"}));
        record.raw_ssn = Some("123-45-6789".to_string());
        record.phone = Some("415-555-0100".to_string());
        record.zip = Some("94105".to_string());
        record.income_history.push(IncomeRecord {
            amount: Money(7_500_000),
            period: IncomePeriod::Annual,
            year: 2024,
            source_type: IncomeSourceType::Employment,
            employer: Some("Acme".to_string()),
        });
        record.account_numbers.push(AccountNumber {
            number: "123".to_string(),
            account_type: AccountType::Bank,
        });
        record.account_numbers.push(AccountNumber {
            number: "456".to_string(),
            account_type: AccountType::Loan,
        });
        record.sources.push(crate::models::SourceReference {
            document_id: uuid::Uuid::new_v4(),
            page_number: 1,
            section: None,
            snippet: "Jane Doe".to_string(),
            char_start: None,
            char_end: None,
        });
        record.sources.push(crate::models::SourceReference {
            document_id: uuid::Uuid::new_v4(),
            page_number: 2,
            section: None,
            snippet: "94105".to_string(),
            char_start: None,
            char_end: None,
        });
        let (score, needs_review) = score(&record);
        assert!((score - 1.0).abs() < 1e-9);
        assert!(!needs_review);
    }

    #[test]
    fn invalid_ssn_forfeits_format_validation_bonus() {
        let mut record = BorrowerRecord::new("Jane Doe");
        record.raw_ssn = Some("000-00-0000".to_string());
        let (score_with_bad_ssn, _) = score(&record);
        record.raw_ssn = None;
        let (score_without_ssn, _) = score(&record);
        assert_eq!(score_with_bad_ssn, score_without_ssn);
    }

    #[test]
    fn score_never_exceeds_one() {
        let mut record = BorrowerRecord::new("Jane Doe");
        record.address = Some(serde_json::json!({}));
        record.raw_ssn = Some("123-45-6789".to_string());
        record.income_history.push(IncomeRecord {
            amount: Money(100),
            period: IncomePeriod::Monthly,
            year: 2024,
            source_type: IncomeSourceType::Employment,
            employer: None,
        });
        for _ in 0..5 {
            record.sources.push(crate::models::SourceReference {
                document_id: uuid::Uuid::new_v4(),
                page_number: 1,
                section: None,
                snippet: "x".to_string(),
                char_start: None,
                char_end: None,
            });
        }
        let (score, _) = score(&record);
        assert!(score <= 1.0);
    }
}
