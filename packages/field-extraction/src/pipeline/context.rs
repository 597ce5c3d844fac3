//! Shrinks long documents to the passages relevant to a schema.
//!
//! Keywords from field names, descriptions and learned examples are
//! located in an accent-folded, lowercased copy of the text, and a window
//! of the original text around each hit is kept.

use indexmap::IndexSet;
use std::collections::HashMap;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::pipeline::learner::LearnedPattern;
use crate::types::request::Schema;

const MIN_KEYWORD_CHARS: usize = 3;
const SEGMENT_SEPARATOR: &str = "\n\n";

/// Keyword-window context compactor. All lengths are in chars.
#[derive(Debug, Clone, Copy)]
pub struct ContextCompactor {
    max_chars: usize,
    window: usize,
}

impl Default for ContextCompactor {
    fn default() -> Self {
        Self::new(2500, 240)
    }
}

impl ContextCompactor {
    pub fn new(max_chars: usize, window: usize) -> Self {
        Self { max_chars, window }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Compact `text` for `schema`. Never returns more than `max_chars` chars.
    pub fn compact(
        &self,
        text: &str,
        schema: &Schema,
        learned: &HashMap<String, LearnedPattern>,
    ) -> String {
        if text.chars().count() <= self.max_chars {
            return text.to_string();
        }

        let folded = FoldedText::new(text);
        let mut spans: Vec<(usize, usize)> = Vec::new();

        for keyword in collect_keywords(schema, learned) {
            for (byte_start, matched) in folded.normalized.match_indices(keyword.as_str()) {
                let Some((start, end)) = folded.original_span(byte_start, matched.len()) else {
                    continue;
                };
                let start = start.saturating_sub(self.window);
                let end = (end + self.window).min(folded.char_count());
                if !spans.iter().any(|&(s, e)| start.max(s) < end.min(e)) {
                    spans.push((start, end));
                }
            }
        }

        spans.sort_unstable();
        let compact = self.join(spans.iter().map(|&(s, e)| folded.slice(s, e).trim()));
        if compact.is_empty() {
            self.head(text)
        } else {
            compact
        }
    }

    fn join<'a>(&self, segments: impl Iterator<Item = &'a str>) -> String {
        let mut out = String::new();
        let mut size = 0;
        for segment in segments.filter(|s| !s.is_empty()) {
            let separator = if size == 0 { 0 } else { SEGMENT_SEPARATOR.len() };
            let added = separator + segment.chars().count();
            if size + added > self.max_chars {
                break;
            }
            if size > 0 {
                out.push_str(SEGMENT_SEPARATOR);
            }
            out.push_str(segment);
            size += added;
        }
        out
    }

    fn head(&self, text: &str) -> String {
        text.chars().take(self.max_chars).collect()
    }
}

/// Accent-folded lowercase copy of a text, with a map back to the
/// original char positions.
struct FoldedText<'a> {
    original: &'a str,
    normalized: String,
    /// Original char index for every byte of `normalized`
    origin: Vec<usize>,
    /// Byte offset of every original char, plus the end
    char_offsets: Vec<usize>,
}

impl<'a> FoldedText<'a> {
    fn new(original: &'a str) -> Self {
        let mut normalized = String::with_capacity(original.len());
        let mut origin = Vec::with_capacity(original.len());
        let mut char_offsets = Vec::with_capacity(original.len() + 1);

        for (char_idx, (byte_idx, c)) in original.char_indices().enumerate() {
            char_offsets.push(byte_idx);
            for folded in std::iter::once(c).nfkd().filter(|d| !is_combining_mark(*d)) {
                for lower in folded.to_lowercase() {
                    normalized.push(lower);
                    origin.resize(normalized.len(), char_idx);
                }
            }
        }
        char_offsets.push(original.len());

        Self {
            original,
            normalized,
            origin,
            char_offsets,
        }
    }

    fn char_count(&self) -> usize {
        self.char_offsets.len() - 1
    }

    /// Original `[start, end)` char span covering a normalized byte range.
    fn original_span(&self, byte_start: usize, byte_len: usize) -> Option<(usize, usize)> {
        let start = *self.origin.get(byte_start)?;
        let last = *self.origin.get(byte_start + byte_len.checked_sub(1)?)?;
        Some((start, last + 1))
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.original[self.char_offsets[start]..self.char_offsets[end]]
    }
}

fn fold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Folded keywords in schema order, de-duplicated.
fn collect_keywords(schema: &Schema, learned: &HashMap<String, LearnedPattern>) -> IndexSet<String> {
    let mut keywords = IndexSet::new();
    for (field, description) in schema.iter() {
        let example = learned.get(field).map(|p| p.example.as_str()).unwrap_or("");
        for source in [field, description, example] {
            keywords.extend(
                source
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
                    .map(fold)
                    .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS),
            );
        }
    }
    keywords
}
