//! Domain types for cidlens.
//!
//! This module contains the core data structures:
//! - Prediction: codes returned by the model and their grounding in a note
//! - Session: the per-user analysis state machine
//! - Feedback: clinician verdicts on predicted codes

pub mod feedback;
pub mod prediction;
pub mod session;

// Re-export commonly used types
pub use feedback::{compute_hash, FeedbackRecord, Verdict};
pub use prediction::{CodeKind, PredictedCode, Prediction, PredictionResult};
pub use session::{AnalysisSession, SessionError, SessionState};
