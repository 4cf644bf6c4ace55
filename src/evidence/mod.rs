//! Evidence location and highlighting
//!
//! The model claims that certain phrases of a clinical note support each
//! predicted code. This module grounds those phrases back in the note and
//! renders the note with the grounded spans highlighted.
//!
//! # Design Principles
//!
//! - **Honest spans**: a span is only produced where the phrase literally occurs
//!   (ignoring case). Phrases the model invented resolve to nothing.
//! - **Original casing**: span text is always sliced from the note, never taken
//!   from the model's phrase.
//! - **Validated rendering**: the renderer rejects malformed span lists.
//!
//! # Example
//!
//! ```
//! use cidlens::evidence::{locate, merge_overlapping, render};
//!
//! let note = "Gestante com Diabetes Gestacional.";
//! let spans = locate(note, &["diabetes gestacional"]);
//! let segments = render(note, &merge_overlapping(note, &spans)).unwrap();
//!
//! assert_eq!(spans[0].text, "Diabetes Gestacional");
//! assert_eq!(segments.len(), 3);
//! ```

pub mod highlight;
pub mod spans;
pub mod types;

pub use highlight::{merge_overlapping, render, to_html, to_terminal, validate_spans, SpanError};
pub use spans::{
    extract_anchor_text, find_case_insensitive_matches, locate, offset_to_line_col, LineCol,
};
pub use types::{HighlightSegment, Span};
