//! Core application logic.
//!
//! This module contains:
//! - Analyzer: note → provider → grounded predictions
//! - Catalog: ICD-10 code descriptions
//! - FeedbackLog: append-only clinician verdicts
//! - Safety: limits enforced before a note is sent

pub mod analyzer;
pub mod catalog;
pub mod feedback_log;
pub mod safety;

// Re-export commonly used types
pub use analyzer::{AnalyzeError, Analyzer};
pub use catalog::{CidCatalog, UNKNOWN_DESCRIPTION};
pub use feedback_log::FeedbackLog;
pub use safety::{SafetyLimits, SafetyViolation};
