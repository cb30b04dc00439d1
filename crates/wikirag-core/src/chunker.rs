//! Overlapping passage splitter.
//!
//! Passages are cut on character (not byte) positions. A passage ends on the
//! best natural boundary found in the last fifth of its window: paragraph
//! break, then sentence end, then line break, then word boundary, falling back
//! to a hard cut. The next passage starts on a word boundary far enough back to
//! share at least `chunk_overlap` characters with the previous one.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Passage, SourceText};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 500, chunk_overlap: 50 }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Normalize a [`SourceText`] into records and split each of them.
pub fn split_source(source: SourceText, config: &ChunkingConfig) -> Result<Vec<Passage>> {
    let texts: Vec<String> = source.into_records().into_iter().map(|r| r.text).collect();
    if texts.is_empty() {
        return Err(Error::EmptyInput("source text".into()));
    }
    split(&texts, config.chunk_size, config.chunk_overlap)
}

/// Split already-filtered texts into passages, numbering them in origin order.
pub fn split<S: AsRef<str>>(texts: &[S], chunk_size: usize, chunk_overlap: usize) -> Result<Vec<Passage>> {
    ChunkingConfig { chunk_size, chunk_overlap }.validate()?;
    let mut passages = Vec::new();
    for (source, text) in texts.iter().enumerate() {
        for piece in split_one(text.as_ref(), chunk_size, chunk_overlap) {
            let trimmed = piece.trim();
            if trimmed.is_empty() { continue; }
            passages.push(Passage { text: trimmed.to_string(), order: passages.len(), source });
        }
    }
    if passages.is_empty() {
        return Err(Error::EmptyChunk);
    }
    Ok(passages)
}

fn split_one(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    let mut out = Vec::new();
    let mut start = 0;
    while start < len {
        if start + size >= len {
            out.push(chars[start..].iter().collect());
            break;
        }
        let end = find_end(&chars, start, size);
        out.push(chars[start..end].iter().collect());
        start = find_next_start(&chars, start, end, overlap);
    }
    out
}

/// Exclusive end index for the passage starting at `start`. Requires `start + size < chars.len()`.
fn find_end(chars: &[char], start: usize, size: usize) -> usize {
    let hi = start + size;
    let lo = (hi - size / 5).max(start + 1);
    let ends_word = |e: usize| !chars[e - 1].is_whitespace();

    let paragraph = |e: usize| chars[e] == '\n' && chars.get(e + 1) == Some(&'\n') && ends_word(e);
    let sentence = |e: usize| matches!(chars[e - 1], '.' | '!' | '?') && chars[e].is_whitespace();
    let line = |e: usize| chars[e] == '\n' && ends_word(e);
    let word = |e: usize| chars[e].is_whitespace() && ends_word(e);

    let rules: [&dyn Fn(usize) -> bool; 4] = [&paragraph, &sentence, &line, &word];
    for rule in rules {
        if let Some(e) = (lo..=hi).rev().find(|&e| rule(e)) {
            return e;
        }
    }
    hi
}

/// Start of the passage after `[start, end)`, keeping at least `overlap` shared characters.
fn find_next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    // Overlap is measured against the trimmed passage, so trailing whitespace does not count.
    let mut kept = end;
    while kept > start + 1 && chars[kept - 1].is_whitespace() {
        kept -= 1;
    }
    let latest = kept.saturating_sub(overlap);
    let earliest = (start + 1).max(kept.saturating_sub(2 * overlap));
    if earliest <= latest {
        let boundary = (earliest..=latest)
            .rev()
            .find(|&s| chars[s - 1].is_whitespace() && !chars[s].is_whitespace());
        if let Some(s) = boundary {
            return s;
        }
    }
    // No word boundary nearby: hard start, backing off whitespace so trimming keeps the overlap.
    let mut s = latest.max(start + 1);
    while s > start + 1 && chars[s].is_whitespace() {
        s -= 1;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_paragraph_break_inside_window() {
        let first = "a".repeat(90);
        let text = format!("{first}\n\n{}", "b ".repeat(40));
        let chars: Vec<char> = text.chars().collect();
        assert_eq!(find_end(&chars, 0, 100), 90);
    }

    #[test]
    fn prefers_sentence_end_over_word() {
        let text = format!("{}. {}", "w".repeat(85), "next words here and more and more");
        let chars: Vec<char> = text.chars().collect();
        assert_eq!(find_end(&chars, 0, 100), 86);
    }

    #[test]
    fn hard_cut_without_boundaries() {
        let chars: Vec<char> = "z".repeat(300).chars().collect();
        assert_eq!(find_end(&chars, 0, 100), 100);
        assert_eq!(find_next_start(&chars, 0, 100, 10), 90);
    }

    #[test]
    fn next_start_lands_on_word() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chars: Vec<char> = text.chars().collect();
        let s = find_next_start(&chars, 0, 30, 10);
        assert!(s <= 20);
        assert!(chars[s - 1].is_whitespace());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = split(&["abc"], 10, 10).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
