//! Highlight rendering over a clinical note
//!
//! Turns a sorted, non-overlapping span list into segments that cover the
//! note exactly once. Malformed span lists are rejected up front instead of
//! producing a garbled rendering.

use thiserror::Error;

use super::types::{HighlightSegment, Span};

/// Rejection reasons for span lists handed to [`render`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpanError {
    #[error("span {index} is empty ({start}..{end})")]
    Empty {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("span {index} ends at {end}, past the end of the text ({len} bytes)")]
    OutOfRange { index: usize, end: usize, len: usize },

    #[error("span {index} offset {offset} is not on a char boundary")]
    NotCharBoundary { index: usize, offset: usize },

    #[error("span {index} text does not match the original text at {start}..{end}")]
    TextMismatch {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("span {index} starts at {start}, before the previous span start {previous_start}")]
    Unsorted {
        index: usize,
        start: usize,
        previous_start: usize,
    },

    #[error("span {index} starts at {start}, inside the previous span ending at {previous_end}")]
    Overlapping {
        index: usize,
        start: usize,
        previous_end: usize,
    },
}

/// Check that `spans` can be rendered over `original_text`
pub fn validate_spans(original_text: &str, spans: &[Span]) -> Result<(), SpanError> {
    let len = original_text.len();
    let mut previous: Option<&Span> = None;

    for (index, span) in spans.iter().enumerate() {
        if span.start >= span.end {
            return Err(SpanError::Empty {
                index,
                start: span.start,
                end: span.end,
            });
        }
        if span.end > len {
            return Err(SpanError::OutOfRange {
                index,
                end: span.end,
                len,
            });
        }
        for offset in [span.start, span.end] {
            if !original_text.is_char_boundary(offset) {
                return Err(SpanError::NotCharBoundary { index, offset });
            }
        }
        if original_text[span.start..span.end] != span.text {
            return Err(SpanError::TextMismatch {
                index,
                start: span.start,
                end: span.end,
            });
        }

        if let Some(prev) = previous {
            if span.start < prev.start {
                return Err(SpanError::Unsorted {
                    index,
                    start: span.start,
                    previous_start: prev.start,
                });
            }
            if span.start < prev.end {
                return Err(SpanError::Overlapping {
                    index,
                    start: span.start,
                    previous_end: prev.end,
                });
            }
        }
        previous = Some(span);
    }

    Ok(())
}

/// Render `original_text` into plain and highlighted segments
///
/// Concatenating the returned segment texts always yields `original_text`.
/// With no spans the whole text comes back as one plain segment (or nothing
/// for an empty text).
pub fn render(original_text: &str, spans: &[Span]) -> Result<Vec<HighlightSegment>, SpanError> {
    validate_spans(original_text, spans)?;

    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut last_end = 0;

    for span in spans {
        if span.start > last_end {
            segments.push(HighlightSegment::plain(&original_text[last_end..span.start]));
        }
        segments.push(HighlightSegment::highlighted(span.text.clone()));
        last_end = span.end;
    }

    if last_end < original_text.len() {
        segments.push(HighlightSegment::plain(&original_text[last_end..]));
    }

    Ok(segments)
}

/// Coalesce overlapping spans into a renderable, non-overlapping set
///
/// [`super::spans::locate`] keeps overlapping matches from different terms.
/// Hover rendering needs them unioned. Spans that only touch stay separate.
/// Spans that do not slice `original_text` cleanly are dropped.
pub fn merge_overlapping(original_text: &str, spans: &[Span]) -> Vec<Span> {
    let mut ranges: Vec<(usize, usize)> = spans.iter().map(|s| (s.start, s.end)).collect();
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(ranges.len());
    for (start, end) in ranges {
        match merged.last_mut() {
            Some((_, last_end)) if start < *last_end => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    merged
        .into_iter()
        .filter_map(|(start, end)| Span::from_range(original_text, start, end))
        .collect()
}

/// Render segments as HTML, escaping text and wrapping highlights in
/// `<span class="highlight">`
pub fn to_html(segments: &[HighlightSegment]) -> String {
    let mut html = String::new();
    for segment in segments {
        if segment.highlighted {
            html.push_str("<span class=\"highlight\">");
            push_escaped(&mut html, &segment.text);
            html.push_str("</span>");
        } else {
            push_escaped(&mut html, &segment.text);
        }
    }
    html
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

/// Render segments for a terminal, highlighting with ANSI reverse video
pub fn to_terminal(segments: &[HighlightSegment]) -> String {
    let mut out = String::new();
    for segment in segments {
        if segment.highlighted {
            out.push_str("\x1b[7m");
            out.push_str(&segment.text);
            out.push_str("\x1b[0m");
        } else {
            out.push_str(&segment.text);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, start: usize, end: usize) -> Span {
        Span::from_range(text, start, end).unwrap()
    }

    #[test]
    fn test_render_interleaves_plain_and_highlighted() {
        let text = "has fever and Fever";
        let spans = vec![span(text, 4, 9), span(text, 14, 19)];

        let segments = render(text, &spans).unwrap();
        assert_eq!(
            segments,
            vec![
                HighlightSegment::plain("has "),
                HighlightSegment::highlighted("fever"),
                HighlightSegment::plain(" and "),
                HighlightSegment::highlighted("Fever"),
            ]
        );
    }

    #[test]
    fn test_render_adjacent_spans_have_no_gap_segment() {
        let text = "abcd";
        let spans = vec![span(text, 0, 2), span(text, 2, 4)];
        let segments = render(text, &spans).unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments.iter().all(|s| s.highlighted));
    }

    #[test]
    fn test_render_empty_text() {
        assert!(render("", &[]).unwrap().is_empty());
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let text = "xabcx";
        let spans = vec![span(text, 1, 3), span(text, 1, 4)];
        assert!(matches!(
            validate_spans(text, &spans),
            Err(SpanError::Overlapping { index: 1, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_text_mismatch() {
        let spans = vec![Span {
            start: 0,
            end: 3,
            text: "xyz".to_string(),
        }];
        assert!(matches!(
            validate_spans("abc", &spans),
            Err(SpanError::TextMismatch { .. })
        ));
    }

    #[test]
    fn test_merge_overlapping() {
        let text = "xabcx";
        let spans = vec![span(text, 1, 3), span(text, 1, 4), span(text, 4, 5)];
        let merged = merge_overlapping(text, &spans);
        assert_eq!(merged, vec![span(text, 1, 4), span(text, 4, 5)]);
        assert!(render(text, &merged).is_ok());
    }

    #[test]
    fn test_to_html_escapes() {
        let segments = vec![
            HighlightSegment::plain("PA <140> & "),
            HighlightSegment::highlighted("\"HAS\""),
        ];
        assert_eq!(
            to_html(&segments),
            "PA &lt;140&gt; &amp; <span class=\"highlight\">&quot;HAS&quot;</span>"
        );
    }

    #[test]
    fn test_to_terminal() {
        let segments = vec![
            HighlightSegment::plain("a "),
            HighlightSegment::highlighted("b"),
        ];
        assert_eq!(to_terminal(&segments), "a \x1b[7mb\x1b[0m");
    }
}
