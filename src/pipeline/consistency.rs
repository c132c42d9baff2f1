//! Consistency checker: flags anomalies across deduplicated borrower records.
//! Never merges or mutates; only emits warnings.

use std::collections::HashMap;

use crate::models::{BorrowerRecord, ConsistencyWarning, ConsistencyWarningKind};

const INCOME_DROP_RATIO: f64 = 0.5;
const INCOME_SPIKE_RATIO: f64 = 3.0;

/// Runs all consistency checks over an already-deduplicated batch of
/// records, returning warnings keyed by the record's index in `records`.
pub fn check(records: &[BorrowerRecord]) -> Vec<ConsistencyWarning> {
    let mut warnings = Vec::new();

    for (index, record) in records.iter().enumerate() {
        warnings.extend(check_address_conflict(index, record));
        warnings.extend(check_income_trend(index, record));
    }

    warnings.extend(check_cross_document_mismatch(records));

    warnings
}

fn check_address_conflict(index: usize, record: &BorrowerRecord) -> Option<ConsistencyWarning> {
    if record.sources.len() > 1 && record.address.is_some() {
        Some(ConsistencyWarning {
            kind: ConsistencyWarningKind::AddressConflict,
            borrower_index: index,
            field: "address".to_string(),
            message: format!(
                "borrower has {} sources and a set address; may be a merge of partial views",
                record.sources.len()
            ),
            details: HashMap::new(),
        })
    } else {
        None
    }
}

fn check_income_trend(index: usize, record: &BorrowerRecord) -> Vec<ConsistencyWarning> {
    let mut sorted: Vec<_> = record.income_history.iter().collect();
    sorted.sort_by_key(|income| income.year);

    let mut warnings = Vec::new();
    for window in sorted.windows(2) {
        let (prev, curr) = (window[0], window[1]);
        if prev.amount.0 <= 0 {
            continue;
        }
        let ratio = curr.amount.0 as f64 / prev.amount.0 as f64;
        if ratio < INCOME_DROP_RATIO {
            warnings.push(ConsistencyWarning {
                kind: ConsistencyWarningKind::IncomeDrop,
                borrower_index: index,
                field: "income_history".to_string(),
                message: format!(
                    "income dropped from {} ({}) to {} ({}), ratio {:.2}",
                    prev.year, prev.amount.0, curr.year, curr.amount.0, ratio
                ),
                details: HashMap::from([
                    ("from_year".to_string(), prev.year.to_string()),
                    ("to_year".to_string(), curr.year.to_string()),
                ]),
            });
        } else if ratio > INCOME_SPIKE_RATIO {
            warnings.push(ConsistencyWarning {
                kind: ConsistencyWarningKind::IncomeSpike,
                borrower_index: index,
                field: "income_history".to_string(),
                message: format!(
                    "income rose from {} ({}) to {} ({}), ratio {:.2}",
                    prev.year, prev.amount.0, curr.year, curr.amount.0, ratio
                ),
                details: HashMap::from([
                    ("from_year".to_string(), prev.year.to_string()),
                    ("to_year".to_string(), curr.year.to_string()),
                ]),
            });
        }
    }
    warnings
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ssn_last4(ssn: &Option<String>) -> Option<String> {
    ssn.as_ref().and_then(|s| {
        let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() >= 4 {
            Some(digits[digits.len() - 4..].to_string())
        } else {
            None
        }
    })
}

fn check_cross_document_mismatch(records: &[BorrowerRecord]) -> Vec<ConsistencyWarning> {
    let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        by_name
            .entry(normalize_name(&record.full_name))
            .or_default()
            .push(index);
    }

    let mut warnings = Vec::new();
    for indices in by_name.values() {
        if indices.len() < 2 {
            continue;
        }
        for i in 0..indices.len() {
            for j in (i + 1)..indices.len() {
                let a = &records[indices[i]];
                let b = &records[indices[j]];
                let (Some(last4_a), Some(last4_b)) = (ssn_last4(&a.raw_ssn), ssn_last4(&b.raw_ssn))
                else {
                    continue;
                };
                if last4_a != last4_b {
                    warnings.push(ConsistencyWarning {
                        kind: ConsistencyWarningKind::CrossDocMismatch,
                        borrower_index: indices[i],
                        field: "ssn".to_string(),
                        message: format!(
                            "borrowers {} and {} share a name but SSN last-4s differ",
                            indices[i], indices[j]
                        ),
                        details: HashMap::from([
                            ("other_index".to_string(), indices[j].to_string()),
                        ]),
                    });
                }
            }
        }
    }
    warnings
}
