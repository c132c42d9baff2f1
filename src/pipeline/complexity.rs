//! Complexity classifier: decides STANDARD vs COMPLEX for a document body.

use crate::models::{ComplexityAssessment, ComplexityLevel};

const MULTI_BORROWER_TOKENS: &[&str] = &[
    "co-borrower",
    "joint applicant",
    "spouse",
    "borrower 2",
    "second borrower",
];

const POOR_SCAN_MARKERS: &[&str] = &["[illegible]", "[unclear]"];
const HANDWRITTEN_MARKERS: &[&str] = &["[handwritten]", "signature:", "signed:"];

/// Classifies a document body's complexity from text signals and an inferred
/// page count.
pub fn classify(text: &str, page_count: Option<u32>) -> ComplexityAssessment {
    let lower = text.to_lowercase();

    let multi_borrower_hits = MULTI_BORROWER_TOKENS
        .iter()
        .filter(|token| lower.contains(*token))
        .count();

    let has_poor_quality =
        POOR_SCAN_MARKERS.iter().any(|m| lower.contains(m)) || has_triple_question_marks(&lower);

    let has_handwritten = HANDWRITTEN_MARKERS.iter().any(|m| lower.contains(m));

    let many_pages = page_count.map(|n| n > 10).unwrap_or(false);

    let level = if multi_borrower_hits > 0 || many_pages || has_poor_quality || has_handwritten {
        ComplexityLevel::Complex
    } else {
        ComplexityLevel::Standard
    };

    ComplexityAssessment {
        level,
        estimated_borrowers: multi_borrower_hits + 1,
        has_handwritten,
        has_poor_quality,
    }
}

fn has_triple_question_marks(text: &str) -> bool {
    let mut run = 0;
    for ch in text.chars() {
        if ch == '?' {
            run += 1;
            if run >= 3 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_single_borrower_text_is_standard() {
        let assessment = classify("Applicant: John Smith. Income: $75,000.", Some(2));
        assert_eq!(assessment.level, ComplexityLevel::Standard);
        assert_eq!(assessment.estimated_borrowers, 1);
        assert!(!assessment.has_handwritten);
        assert!(!assessment.has_poor_quality);
    }

    #[test]
    fn co_borrower_token_promotes_to_complex() {
        let assessment = classify("Applicant and Co-Borrower are joint applicants.", Some(2));
        assert_eq!(assessment.level, ComplexityLevel::Complex);
        assert_eq!(assessment.estimated_borrowers, 3);
    }

    #[test]
    fn page_count_over_ten_promotes_to_complex() {
        let assessment = classify("plain text", Some(11));
        assert_eq!(assessment.level, ComplexityLevel::Complex);
    }

    #[test]
    fn triple_question_marks_flag_poor_quality() {
        let assessment = classify("amount was ??? on this page", Some(1));
        assert!(assessment.has_poor_quality);
        assert_eq!(assessment.level, ComplexityLevel::Complex);
    }

    #[test]
    fn signature_marker_flags_handwritten() {
        let assessment = classify("Signed: J. Smith", Some(1));
        assert!(assessment.has_handwritten);
        assert_eq!(assessment.level, ComplexityLevel::Complex);
    }

    #[test]
    fn two_question_marks_do_not_trigger_poor_quality() {
        let assessment = classify("is this correct??", Some(1));
        assert!(!assessment.has_poor_quality);
    }
}
