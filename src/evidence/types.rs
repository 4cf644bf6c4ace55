//! Span and highlight segment types
//!
//! These are the values exchanged between the locator, the renderer and the
//! HTTP/CLI surfaces.

use serde::{Deserialize, Serialize};

/// A half-open byte range over the original note plus its literal text
///
/// Offsets are UTF-8 byte offsets and always fall on char boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// Slice of the original text, casing preserved
    pub text: String,
}

impl Span {
    /// Build a span by slicing `original_text`
    ///
    /// Returns `None` if the range is empty, out of bounds, or splits a char.
    pub fn from_range(original_text: &str, start: usize, end: usize) -> Option<Self> {
        if start >= end {
            return None;
        }
        original_text.get(start..end).map(|text| Self {
            start,
            end,
            text: text.to_string(),
        })
    }

    /// Length of the span in bytes
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Spans are never empty once built through `from_range`
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether two spans share at least one byte
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A contiguous run of text, highlighted or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightSegment {
    pub text: String,
    pub highlighted: bool,
}

impl HighlightSegment {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: false,
        }
    }

    pub fn highlighted(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            highlighted: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_range_slices_original_text() {
        let span = Span::from_range("febre alta", 0, 5).unwrap();
        assert_eq!(span.text, "febre");
        assert_eq!(span.len(), 5);
    }

    #[test]
    fn test_from_range_rejects_invalid_ranges() {
        assert!(Span::from_range("abc", 2, 2).is_none());
        assert!(Span::from_range("abc", 1, 10).is_none());
        // 'ã' is two bytes; offset 2 lands inside it
        assert!(Span::from_range("mão", 0, 2).is_none());
    }

    #[test]
    fn test_overlaps() {
        let a = Span::from_range("xabcx", 1, 3).unwrap();
        let b = Span::from_range("xabcx", 1, 4).unwrap();
        let c = Span::from_range("xabcx", 3, 5).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&c));
        assert!(!a.overlaps(&c));
    }
}
