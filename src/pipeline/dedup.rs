//! Deduplicator: merges BorrowerRecords referring to the same person across
//! overlapping document chunks.

use std::collections::{HashMap, HashSet};

use strsim::normalized_levenshtein;

use crate::models::{AccountNumber, BorrowerRecord, IncomeRecord, IncomeSourceType};

const NAME_ZIP_THRESHOLD: f64 = 0.90;
const NAME_ONLY_THRESHOLD: f64 = 0.95;
const NAME_SSN4_THRESHOLD: f64 = 0.80;

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_zip5(zip: &str) -> String {
    zip.chars().take_while(|c| c.is_ascii_digit()).collect::<String>()
}

fn ssn_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn name_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&normalize_name(a), &normalize_name(b))
}

/// Whether two records are considered the same person, per the five
/// priority-ordered predicates. Priority only matters for attribution; the
/// boolean result is the same regardless of which predicate is evaluated
/// first.
fn is_match(a: &BorrowerRecord, b: &BorrowerRecord) -> bool {
    // 1. Matching normalized SSNs.
    if let (Some(ssn_a), Some(ssn_b)) = (&a.raw_ssn, &b.raw_ssn) {
        let (da, db) = (ssn_digits(ssn_a), ssn_digits(ssn_b));
        if da.len() == 9 && da == db {
            return true;
        }
    }

    // 2. Shared account number (bank or loan).
    let numbers_a: HashSet<&str> = a.account_numbers.iter().map(|acc| acc.number.as_str()).collect();
    if b.account_numbers.iter().any(|acc| numbers_a.contains(acc.number.as_str())) {
        return true;
    }

    let similarity = name_similarity(&a.full_name, &b.full_name);

    // 3. Strong name match plus identical ZIP.
    if similarity >= NAME_ZIP_THRESHOLD {
        if let (Some(zip_a), Some(zip_b)) = (&a.zip, &b.zip) {
            if normalize_zip5(zip_a) == normalize_zip5(zip_b) {
                return true;
            }
        }
    }

    // 4. Very strong name match alone.
    if similarity >= NAME_ONLY_THRESHOLD {
        return true;
    }

    // 5. Good name match plus matching SSN last 4.
    if similarity >= NAME_SSN4_THRESHOLD {
        if let (Some(ssn_a), Some(ssn_b)) = (&a.raw_ssn, &b.raw_ssn) {
            let (da, db) = (ssn_digits(ssn_a), ssn_digits(ssn_b));
            if da.len() >= 4 && db.len() >= 4 && da[da.len() - 4..] == db[db.len() - 4..] {
                return true;
            }
        }
    }

    false
}

/// Union-find over record indices, used to cluster transitively-matching
/// records: if A matches B and B matches C, all three merge into one.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

/// Deduplicates a list of BorrowerRecords, merging all records that
/// transitively match per [`is_match`].
pub fn dedup(records: Vec<BorrowerRecord>) -> Vec<BorrowerRecord> {
    let n = records.len();
    if n <= 1 {
        return records;
    }

    let mut dsu = DisjointSet::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if is_match(&records[i], &records[j]) {
                dsu.union(i, j);
            }
        }
    }

    let mut clusters: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let root = dsu.find(i);
        clusters.entry(root).or_default().push(i);
    }

    let mut roots: Vec<usize> = clusters.keys().copied().collect();
    roots.sort_unstable();

    roots
        .into_iter()
        .map(|root| merge_cluster(&records, &clusters[&root]))
        .collect()
}

fn merge_cluster(records: &[BorrowerRecord], indices: &[usize]) -> BorrowerRecord {
    if indices.len() == 1 {
        return records[indices[0]].clone();
    }

    let base_index = *indices
        .iter()
        .max_by(|&&a, &&b| {
            records[a]
                .confidence_score
                .partial_cmp(&records[b].confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap();
    let base = &records[base_index];

    let mut merged = BorrowerRecord::new(base.full_name.clone());
    merged.address = base.address.clone();
    merged.zip = base.zip.clone();
    merged.phone = base.phone.clone();
    merged.raw_ssn = indices
        .iter()
        .map(|&i| &records[i])
        .find_map(|r| r.raw_ssn.clone())
        .or_else(|| base.raw_ssn.clone());

    let mut seen_income: HashSet<(i32, i64, String, Option<String>)> = HashSet::new();
    let mut seen_accounts: HashSet<(String, String)> = HashSet::new();

    for &i in indices {
        let record = &records[i];
        for income in &record.income_history {
            let key = (
                income.year,
                income.amount.0,
                income_source_key(&income.source_type),
                income.employer.clone(),
            );
            if seen_income.insert(key) {
                merged.income_history.push(income.clone());
            }
        }
        for account in &record.account_numbers {
            let key = (account.number.clone(), format!("{:?}", account.account_type));
            if seen_accounts.insert(key) {
                merged.account_numbers.push(account.clone());
            }
        }
        merged.sources.extend(record.sources.iter().cloned());
    }

    merged.confidence_score = indices
        .iter()
        .map(|&i| records[i].confidence_score)
        .fold(f64::MIN, f64::max);

    merged
}

fn income_source_key(source: &IncomeSourceType) -> String {
    match source {
        IncomeSourceType::Employment => "employment".to_string(),
        IncomeSourceType::SelfEmployment => "self-employment".to_string(),
        IncomeSourceType::Other(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccountType, IncomePeriod, Money};

    fn named(name: &str) -> BorrowerRecord {
        BorrowerRecord::new(name)
    }

    #[test]
    fn matching_ssn_merges_two_records() {
        let mut a = named("John Smith");
        a.raw_ssn = Some("123-45-6789".to_string());
        let mut b = named("Jon Smith");
        b.raw_ssn = Some("123456789".to_string());
        let merged = dedup(vec![a, b]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn shared_account_number_merges() {
        let mut a = named("Alice A");
        a.account_numbers.push(AccountNumber { number: "ACC1".to_string(), account_type: AccountType::Bank });
        let mut b = named("Completely Different");
        b.account_numbers.push(AccountNumber { number: "ACC1".to_string(), account_type: AccountType::Bank });
        let merged = dedup(vec![a, b]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn near_identical_names_merge_without_other_signals() {
        let a = named("Jonathan Michael Doe");
        let b = named("Jonathan Michael Doe");
        let merged = dedup(vec![a, b]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn distinct_unrelated_records_are_not_merged() {
        let a = named("Alice Anderson");
        let b = named("Bob Brown");
        let merged = dedup(vec![a, b]);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn transitive_matches_cluster_into_one_record() {
        let mut a = named("Robert Johnson");
        a.zip = Some("94105".to_string());
        let mut b = named("Rob Johnson");
        b.zip = Some("94105".to_string());
        let mut c = named("Rob Johnson");
        c.zip = Some("94105-1234".to_string());
        let merged = dedup(vec![a, b, c]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].sources.len(), 0);
    }

    #[test]
    fn dedup_is_idempotent() {
        let mut a = named("John Smith");
        a.raw_ssn = Some("123-45-6789".to_string());
        let mut b = named("John Smith");
        b.raw_ssn = Some("123-45-6789".to_string());
        let once = dedup(vec![a, b]);
        let twice = dedup(once.clone());
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn merge_unions_income_and_dedups_duplicates() {
        let mut a = named("John Smith");
        a.raw_ssn = Some("123-45-6789".to_string());
        a.income_history.push(IncomeRecord {
            amount: Money(100),
            period: IncomePeriod::Annual,
            year: 2024,
            source_type: IncomeSourceType::Employment,
            employer: None,
        });
        let mut b = named("John Smith");
        b.raw_ssn = Some("123-45-6789".to_string());
        b.income_history.push(IncomeRecord {
            amount: Money(100),
            period: IncomePeriod::Annual,
            year: 2024,
            source_type: IncomeSourceType::Employment,
            employer: None,
        });
        b.income_history.push(IncomeRecord {
            amount: Money(200),
            period: IncomePeriod::Annual,
            year: 2023,
            source_type: IncomeSourceType::Employment,
            employer: None,
        });
        let merged = dedup(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].income_history.len(), 2);
    }

    #[test]
    fn merged_confidence_is_max_of_cluster() {
        let mut a = named("John Smith");
        a.raw_ssn = Some("123-45-6789".to_string());
        a.confidence_score = 0.4;
        let mut b = named("John Smith");
        b.raw_ssn = Some("123-45-6789".to_string());
        b.confidence_score = 0.9;
        let merged = dedup(vec![a, b]);
        assert_eq!(merged[0].confidence_score, 0.9);
    }
}
