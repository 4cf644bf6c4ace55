//! Locating evidence phrases in a clinical note
//!
//! The model returns evidence phrases as free text. This module finds every
//! literal, case-insensitive occurrence of those phrases in the original note
//! and turns them into spans that can be highlighted.
//!
//! # Design Decisions
//!
//! - **Literal match only**: no stemming, no whitespace normalization
//! - **Per-char case folding**: Unicode lowercase mapping is applied one char at
//!   a time, so offsets always map back to char boundaries of the original
//! - **No merging**: overlapping matches from different terms are all kept;
//!   only exact `(start, end)` duplicates collapse
//! - **UTF-8 byte offsets**: all offsets are byte indices into the note

use std::collections::BTreeSet;

use super::types::Span;

/// Resolve evidence terms into sorted, deduplicated spans over `original_text`
///
/// Blank terms are ignored. Every occurrence of every term is recorded,
/// including overlapping occurrences of the same term. The result is sorted
/// by start, then end.
pub fn locate<S: AsRef<str>>(original_text: &str, terms: &[S]) -> Vec<Span> {
    let mut ranges = BTreeSet::new();

    for term in terms {
        let term = term.as_ref();
        if term.trim().is_empty() {
            continue;
        }
        ranges.extend(find_case_insensitive_matches(original_text, term));
    }

    ranges
        .into_iter()
        .filter_map(|(start, end)| Span::from_range(original_text, start, end))
        .collect()
}

/// Find all case-insensitive matches of `term` in `text`
///
/// Returns `(start, end)` byte ranges in ascending order. A match may start
/// at any char boundary, so overlapping matches are reported. This is a
/// simple sliding window search, O(n*m) worst case.
pub fn find_case_insensitive_matches(text: &str, term: &str) -> Vec<(usize, usize)> {
    let needle = fold_case(term);
    if needle.is_empty() {
        return Vec::new();
    }

    text.char_indices()
        .filter_map(|(start, _)| match_end_at(text, start, &needle).map(|end| (start, end)))
        .collect()
}

/// Lowercase a string into a char sequence
fn fold_case(s: &str) -> Vec<char> {
    s.chars().flat_map(char::to_lowercase).collect()
}

/// Try to match the folded `needle` starting at byte `start` of `text`
///
/// Returns the end byte offset when the match ends exactly on a char
/// boundary. A char whose lowercase form only partially fits the remaining
/// needle is a mismatch.
fn match_end_at(text: &str, start: usize, needle: &[char]) -> Option<usize> {
    let mut matched = 0;

    for (offset, ch) in text[start..].char_indices() {
        for lower in ch.to_lowercase() {
            if matched == needle.len() || needle[matched] != lower {
                return None;
            }
            matched += 1;
        }

        if matched == needle.len() {
            return Some(start + offset + ch.len_utf8());
        }
    }

    None
}

/// Extract anchor text around a span
///
/// Returns roughly `window` bytes of context centered on the span, with
/// ellipses when the context was truncated.
pub fn extract_anchor_text(text: &str, start: usize, end: usize, window: usize) -> String {
    let len = text.len();
    let remaining = window.saturating_sub(end - start);
    let each_side = remaining / 2;

    let mut anchor_start = start.saturating_sub(each_side);
    while anchor_start > 0 && !text.is_char_boundary(anchor_start) {
        anchor_start -= 1;
    }

    let mut anchor_end = (end + each_side).min(len);
    while anchor_end < len && !text.is_char_boundary(anchor_end) {
        anchor_end += 1;
    }

    let prefix = if anchor_start > 0 { "..." } else { "" };
    let suffix = if anchor_end < len { "..." } else { "" };

    // Notes are often multi-line; keep the anchor on one line
    let anchor = text[anchor_start..anchor_end].replace('\n', " ");

    format!("{}{}{}", prefix, anchor, suffix)
}

/// Line and column position (1-indexed for editor compatibility)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCol {
    pub line: usize,
    pub col: usize,
}

/// Convert a byte offset to a 1-indexed line/column position
///
/// Column counts chars, not bytes.
pub fn offset_to_line_col(text: &str, offset: usize) -> LineCol {
    let offset = offset.min(text.len());
    let prefix = &text[..offset];

    let line = prefix.matches('\n').count() + 1;
    let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let col = text[line_start..offset].chars().count() + 1;

    LineCol { line, col }
}
