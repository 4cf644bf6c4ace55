//! cidlens - ICD-10 code suggestion for clinical notes
//!
//! Sends a clinical note to a hosted language model, receives ICD-10 (CID-10)
//! codes with the phrases the model cites as evidence, and grounds those
//! phrases back in the note so they can be highlighted.
//!
//! # Architecture
//!
//! The model is never trusted for positions:
//! - Providers only return codes and evidence phrases
//! - Spans are located in the original note, case-insensitively
//! - Phrases that do not occur in the note resolve to nothing
//!
//! # Modules
//!
//! - `adapters`: Prediction providers (OpenAI, Hugging Face) and output repair
//! - `core`: Analysis, CID catalog, safety limits, feedback log
//! - `domain`: Data structures (Prediction, AnalysisSession, FeedbackRecord)
//! - `evidence`: Span location and highlight rendering
//! - `server`: HTTP API
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Predict codes for a note
//! cidlens analyze --input nota.txt --highlight O24.4
//!
//! # Locate phrases without calling a model
//! echo "Paciente com febre" | cidlens locate --term febre
//!
//! # Serve the HTTP API
//! cidlens serve --address 127.0.0.1:3000
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod evidence;
pub mod server;

// Re-export main types at crate root for convenience
pub use adapters::{PredictError, PredictionClient, Provider, ProviderKind};
pub use core::{Analyzer, CidCatalog};
pub use domain::{AnalysisSession, PredictedCode, Prediction, PredictionResult, SessionState};
pub use evidence::{locate, render, HighlightSegment, Span, SpanError};
