//! Offset translator: bidirectional character-offset mapping between
//! `raw_text` and `markdown_text` representations of the same document.
//!
//! Builds a matching-blocks table (difflib-equivalent) via the `similar`
//! crate's char-level diff rather than reimplementing Myers/Hirschberg.

use similar::{DiffOp, TextDiff};
use strsim::normalized_levenshtein;

/// Minimum fuzzy similarity between the reported target substring and the
/// source snippet for a translated offset to be trusted.
const VERIFICATION_THRESHOLD: f64 = 0.7;

/// A matching block: `raw_chars[raw_start..raw_start+len]` equals
/// `markdown_chars[markdown_start..markdown_start+len]`.
#[derive(Debug, Clone, Copy)]
struct Block {
    raw_start: usize,
    markdown_start: usize,
    len: usize,
}

/// Translates character offsets between a document's raw text and its
/// markdown-normalized text.
pub struct OffsetTranslator {
    raw_chars: Vec<char>,
    markdown_chars: Option<Vec<char>>,
    blocks: Vec<Block>,
}

impl OffsetTranslator {
    /// Builds a translator for a raw/markdown pair. When `markdown_text` is
    /// `None`, the translator runs in pass-through mode (offsets are assumed
    /// identical on both sides).
    pub fn new(raw_text: &str, markdown_text: Option<&str>) -> Self {
        let raw_chars: Vec<char> = raw_text.chars().collect();
        let (markdown_chars, blocks) = match markdown_text {
            Some(markdown) => {
                let markdown_chars: Vec<char> = markdown.chars().collect();
                let diff = TextDiff::from_chars(raw_text, markdown);
                let mut blocks = Vec::new();
                for op in diff.ops() {
                    if let DiffOp::Equal { old_index, new_index, len } = *op {
                        blocks.push(Block {
                            raw_start: old_index,
                            markdown_start: new_index,
                            len,
                        });
                    }
                }
                (Some(markdown_chars), blocks)
            }
            None => (None, Vec::new()),
        };
        Self { raw_chars, markdown_chars, blocks }
    }

    fn raw_len(&self) -> usize {
        self.raw_chars.len()
    }

    fn markdown_len(&self) -> usize {
        self.markdown_chars.as_ref().map(Vec::len).unwrap_or(0)
    }

    fn raw_substring(&self, start: usize, end: usize) -> String {
        let end = end.min(self.raw_chars.len());
        if start >= end {
            return String::new();
        }
        self.raw_chars[start..end].iter().collect()
    }

    fn markdown_substring(&self, start: usize, end: usize) -> String {
        let Some(chars) = &self.markdown_chars else { return String::new() };
        let end = end.min(chars.len());
        if start >= end {
            return String::new();
        }
        chars[start..end].iter().collect()
    }

    /// Locates the first occurrence of `snippet` within the markdown text,
    /// returning its char span. Used by the character-offset extractor to
    /// anchor a verbatim `extraction_text` before translating to raw offsets.
    pub fn locate_in_markdown(&self, snippet: &str) -> Option<(usize, usize)> {
        let chars = self.markdown_chars.as_ref()?;
        find_subslice(chars, snippet)
    }

    /// Locates the first occurrence of `snippet` within the raw text.
    /// Used in pass-through mode, where the strategy's source text and the
    /// raw text are the same representation.
    pub fn locate_in_raw(&self, snippet: &str) -> Option<(usize, usize)> {
        find_subslice(&self.raw_chars, snippet)
    }

    /// Translates a markdown-side span to raw-text offsets, verifying the
    /// result against `source_snippet`. Returns `None` when the span cannot
    /// be trusted (the caller should leave the source reference's offsets
    /// null in that case).
    pub fn to_raw(&self, markdown_start: usize, markdown_end: usize, source_snippet: &str) -> Option<(usize, usize)> {
        if self.markdown_chars.is_none() {
            // Pass-through mode: markdown offsets are raw offsets.
            let start = markdown_start.min(self.raw_len());
            let end = markdown_end.min(self.raw_len());
            if start >= end {
                return None;
            }
            return Some((start, end));
        }

        let raw_start = self.map(markdown_start, Side::MarkdownToRaw);
        let raw_end = self.map(markdown_end, Side::MarkdownToRaw);
        if raw_start >= raw_end {
            return None;
        }
        let raw_start = raw_start.min(self.raw_len());
        let raw_end = raw_end.min(self.raw_len());
        if raw_start >= raw_end {
            return None;
        }

        let candidate = self.raw_substring(raw_start, raw_end);
        if normalized_levenshtein(&candidate, source_snippet) < VERIFICATION_THRESHOLD {
            return None;
        }
        Some((raw_start, raw_end))
    }

    /// Translates a raw-text span to markdown offsets. Mirrors [`to_raw`]
    /// for callers that start from raw-side offsets.
    pub fn to_markdown(&self, raw_start: usize, raw_end: usize, source_snippet: &str) -> Option<(usize, usize)> {
        if self.markdown_chars.is_none() {
            let start = raw_start.min(self.raw_len());
            let end = raw_end.min(self.raw_len());
            if start >= end {
                return None;
            }
            return Some((start, end));
        }

        let markdown_start = self.map(raw_start, Side::RawToMarkdown);
        let markdown_end = self.map(raw_end, Side::RawToMarkdown);
        if markdown_start >= markdown_end {
            return None;
        }
        let markdown_start = markdown_start.min(self.markdown_len());
        let markdown_end = markdown_end.min(self.markdown_len());
        if markdown_start >= markdown_end {
            return None;
        }

        let candidate = self.markdown_substring(markdown_start, markdown_end);
        if normalized_levenshtein(&candidate, source_snippet) < VERIFICATION_THRESHOLD {
            return None;
        }
        Some((markdown_start, markdown_end))
    }

    fn map(&self, offset: usize, side: Side) -> usize {
        for block in &self.blocks {
            let (a, b) = match side {
                Side::RawToMarkdown => (block.raw_start, block.markdown_start),
                Side::MarkdownToRaw => (block.markdown_start, block.raw_start),
            };
            if offset >= a && offset < a + block.len {
                return b + (offset - a);
            }
        }
        self.interpolate_gap(offset, side)
    }

    fn interpolate_gap(&self, offset: usize, side: Side) -> usize {
        let (a_len, b_len) = match side {
            Side::RawToMarkdown => (self.raw_len(), self.markdown_len()),
            Side::MarkdownToRaw => (self.markdown_len(), self.raw_len()),
        };

        let coord = |block: &Block| -> (usize, usize) {
            match side {
                Side::RawToMarkdown => (block.raw_start, block.markdown_start),
                Side::MarkdownToRaw => (block.markdown_start, block.raw_start),
            }
        };

        let prev = self
            .blocks
            .iter()
            .map(coord)
            .zip(self.blocks.iter().map(|b| b.len))
            .filter(|&((a, _), len)| a + len <= offset)
            .max_by_key(|&((a, _), len)| a + len);

        let next = self
            .blocks
            .iter()
            .map(coord)
            .filter(|&(a, _)| a > offset)
            .min_by_key(|&(a, _)| a);

        match (prev, next) {
            (Some(((pa, pb), plen)), Some((na, nb))) => {
                let prev_end_a = pa + plen;
                let prev_end_b = pb + plen;
                let gap_a = na.saturating_sub(prev_end_a);
                let gap_b = nb.saturating_sub(prev_end_b);
                if gap_a == 0 {
                    prev_end_b
                } else {
                    let frac = (offset.saturating_sub(prev_end_a)) as f64 / gap_a as f64;
                    prev_end_b + (frac * gap_b as f64).round() as usize
                }
            }
            (Some(((pa, pb), plen)), None) => {
                let prev_end_a = pa + plen;
                let prev_end_b = pb + plen;
                let gap_a = a_len.saturating_sub(prev_end_a);
                let gap_b = b_len.saturating_sub(prev_end_b);
                if gap_a == 0 {
                    prev_end_b
                } else {
                    let frac = (offset.saturating_sub(prev_end_a)) as f64 / gap_a as f64;
                    prev_end_b + (frac * gap_b as f64).round() as usize
                }
            }
            (None, Some((na, nb))) => {
                if na == 0 {
                    0
                } else {
                    let frac = offset as f64 / na as f64;
                    (frac * nb as f64).round() as usize
                }
            }
            (None, None) => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    RawToMarkdown,
    MarkdownToRaw,
}

fn find_subslice(haystack: &[char], needle_str: &str) -> Option<(usize, usize)> {
    if needle_str.is_empty() {
        return None;
    }
    let needle: Vec<char> = needle_str.chars().collect();
    if needle.len() > haystack.len() {
        return None;
    }
    for start in 0..=(haystack.len() - needle.len()) {
        if haystack[start..start + needle.len()] == needle[..] {
            return Some((start, start + needle.len()));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_texts_translate_offsets_unchanged() {
        let text = "John Smith earned $75,000 in 2024.";
        let translator = OffsetTranslator::new(text, Some(text));
        let span = translator.to_raw(5, 10, "Smith");
        assert_eq!(span, Some((5, 10)));
    }

    #[test]
    fn pass_through_mode_returns_same_offsets() {
        let text = "John Smith earned $75,000 in 2024.";
        let translator = OffsetTranslator::new(text, None);
        let span = translator.to_raw(0, 4, "John");
        assert_eq!(span, Some((0, 4)));
    }

    #[test]
    fn markdown_bold_markers_shift_later_offsets() {
        let raw = "Name: John Smith. Income: 75000.";
        let markdown = "Name: **John Smith**. Income: 75000.";
        let translator = OffsetTranslator::new(raw, Some(markdown));
        let (start, end) = translator.locate_in_markdown("John Smith").unwrap();
        let span = translator.to_raw(start, end, "John Smith").unwrap();
        assert_eq!(&raw[span.0..span.1], "John Smith");
    }

    #[test]
    fn verification_rejects_low_similarity_translation() {
        let raw = "aaaaaaaaaa";
        let markdown = "bbbbbbbbbb";
        let translator = OffsetTranslator::new(raw, Some(markdown));
        let span = translator.to_raw(0, 5, "completely unrelated text");
        assert!(span.is_none());
    }

    #[test]
    fn locate_in_markdown_finds_verbatim_snippet() {
        let raw = "hello world";
        let markdown = "hello world";
        let translator = OffsetTranslator::new(raw, Some(markdown));
        assert_eq!(translator.locate_in_markdown("world"), Some((6, 11)));
    }

    #[test]
    fn locate_in_markdown_returns_none_when_absent() {
        let translator = OffsetTranslator::new("hello world", Some("hello world"));
        assert!(translator.locate_in_markdown("xyz").is_none());
    }
}
