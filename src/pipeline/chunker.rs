//! Document chunker: splits a text body into overlapping windows on
//! paragraph boundaries.

/// A single chunk of a larger text body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub total: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
}

/// Chunking parameters. Defaults match the 16,000-char window with an
/// 800-char overlap.
#[derive(Debug, Clone, Copy)]
pub struct ChunkConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            max_chars: 16_000,
            overlap_chars: 800,
        }
    }
}

impl ChunkConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        assert!(overlap_chars < max_chars, "overlap_chars must be < max_chars");
        Self { max_chars, overlap_chars }
    }
}

/// Fraction of the chunk window searched for a paragraph boundary, from the
/// end of the window backward.
const BOUNDARY_SEARCH_FRACTION: usize = 80; // search the last 20%, i.e. skip the first 80%

/// Splits `text` into an ordered sequence of overlapping chunks.
///
/// Offsets are inclusive-start, exclusive-end character indices (Unicode
/// scalar values, not bytes). Concatenating the non-overlapping prefix of
/// each chunk reconstructs `text` exactly.
pub fn chunk_text(text: &str, config: ChunkConfig) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= config.max_chars {
        return vec![Chunk {
            index: 0,
            total: 1,
            start_char: 0,
            end_char: len,
            text: text.to_string(),
        }];
    }

    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut start = 0usize;

    while start < len {
        let hard_end = (start + config.max_chars).min(len);
        let mut end = hard_end;

        if hard_end < len {
            let window_start = start + (config.max_chars * BOUNDARY_SEARCH_FRACTION / 100);
            let window_start = window_start.clamp(start, hard_end);
            if let Some(boundary) = find_paragraph_boundary(&chars, window_start, hard_end) {
                end = boundary;
            }
        }

        spans.push((start, end));

        if end >= len {
            break;
        }

        let next_start = end.saturating_sub(config.overlap_chars);
        start = if next_start > start { next_start } else { end };
    }

    let total = spans.len();
    spans
        .into_iter()
        .enumerate()
        .map(|(index, (start_char, end_char))| Chunk {
            index,
            total,
            start_char,
            end_char,
            text: chars[start_char..end_char].iter().collect(),
        })
        .collect()
}

/// Finds the last `"\n\n"` occurrence whose break point (the offset just
/// after the blank line) lies within `[window_start, hard_end]`.
fn find_paragraph_boundary(chars: &[char], window_start: usize, hard_end: usize) -> Option<usize> {
    if hard_end < 2 {
        return None;
    }
    let mut i = hard_end.saturating_sub(2);
    loop {
        if chars[i] == '\n' && chars[i + 1] == '\n' {
            return Some(i + 2);
        }
        if i <= window_start {
            break;
        }
        i -= 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_a_single_chunk() {
        let chunks = chunk_text("hello world", ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 11);
    }

    #[test]
    fn empty_input_is_one_empty_chunk() {
        let chunks = chunk_text("", ChunkConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 0);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn no_newlines_uses_fixed_size_windows() {
        let text = "a".repeat(2500);
        let config = ChunkConfig::new(1000, 100);
        let chunks = chunk_text(&text, config);
        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, 1000);
        assert_eq!(chunks[1].start_char, 900);
    }

    #[test]
    fn prefers_paragraph_boundary_in_last_20_percent_of_window() {
        let mut text = "x".repeat(850);
        text.push_str("\n\n");
        text.push_str(&"y".repeat(500));
        let config = ChunkConfig::new(1000, 100);
        let chunks = chunk_text(&text, config);
        assert_eq!(chunks[0].end_char, 852);
    }

    #[test]
    fn coverage_is_total_and_non_lossy() {
        let mut text = String::new();
        for i in 0..50 {
            text.push_str(&format!("paragraph number {i} with some words in it.\n\n"));
        }
        let config = ChunkConfig::new(200, 40);
        let chunks = chunk_text(&text, config);
        let total_len = text.chars().count();
        let mut covered = 0usize;
        let mut prev_end = 0usize;
        for chunk in &chunks {
            let novel_start = chunk.start_char.max(prev_end);
            if chunk.end_char > novel_start {
                covered += chunk.end_char - novel_start;
            }
            prev_end = chunk.end_char;
        }
        assert_eq!(covered, total_len);
    }

    #[test]
    fn chunk_indices_and_totals_are_consistent() {
        let text = "z".repeat(3000);
        let chunks = chunk_text(&text, ChunkConfig::new(1000, 200));
        let total = chunks.len();
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
            assert_eq!(chunk.total, total);
        }
    }
}
