//! Safety limits applied before a note leaves the machine.
//!
//! Prevents accidental or runaway requests through configurable limits on:
//! - Note size
//! - Request timeout and retries
//! - Denylist patterns (to avoid sending secrets as a "note")

use std::path::Path;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Limits for prediction requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyLimits {
    /// Maximum note size in bytes (default: 64KB)
    #[serde(default = "default_max_note_bytes")]
    pub max_note_bytes: usize,

    /// Per-attempt request timeout in seconds (default: 120)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    /// Extra attempts after a transport failure (default: 2)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Glob patterns to reject (note files matching these won't be sent)
    #[serde(default = "default_denylist")]
    pub denylist_patterns: Vec<String>,
}

fn default_max_note_bytes() -> usize {
    64 * 1024
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    2
}

fn default_denylist() -> Vec<String> {
    vec![
        "**/.env*".to_string(),
        "**/secrets*".to_string(),
        "**/*credential*".to_string(),
        "**/*.pem".to_string(),
        "**/*.key".to_string(),
    ]
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_note_bytes: default_max_note_bytes(),
            request_timeout_seconds: default_request_timeout(),
            max_retries: default_max_retries(),
            denylist_patterns: default_denylist(),
        }
    }
}

impl SafetyLimits {
    /// Check if an input path matches any denylist pattern
    pub fn is_denylisted(&self, path: &str) -> bool {
        self.denylist_patterns
            .iter()
            .filter_map(|p| Pattern::new(p).ok())
            .any(|pattern| pattern.matches(path))
    }

    /// Refuse input files matching the denylist, before they are read
    pub fn check_source(&self, path: &Path) -> Result<(), SafetyViolation> {
        let path_str = path.to_string_lossy();
        if self.is_denylisted(&path_str) {
            return Err(SafetyViolation::DenylistMatch {
                path: path_str.to_string(),
            });
        }
        Ok(())
    }

    /// Validate a note against the blank and size limits
    pub fn validate_note(&self, note: &str) -> Result<(), SafetyViolation> {
        if note.trim().is_empty() {
            return Err(SafetyViolation::EmptyNote);
        }

        let size = note.len();
        if size > self.max_note_bytes {
            return Err(SafetyViolation::MaxNoteBytes {
                actual: size,
                limit: self.max_note_bytes,
            });
        }

        Ok(())
    }
}

/// Safety violation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SafetyViolation {
    #[error("Clinical note is empty")]
    EmptyNote,

    #[error("Clinical note too large: {actual} > {limit} bytes")]
    MaxNoteBytes { actual: usize, limit: usize },

    #[error("Path matches denylist pattern: {path}")]
    DenylistMatch { path: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = SafetyLimits::default();
        assert_eq!(limits.max_note_bytes, 64 * 1024);
        assert_eq!(limits.request_timeout_seconds, 120);
        assert_eq!(limits.max_retries, 2);
    }

    #[test]
    fn test_denylist_matching() {
        let limits = SafetyLimits::default();

        assert!(limits.is_denylisted(".env"));
        assert!(limits.is_denylisted("config/secrets.json"));
        assert!(limits.is_denylisted("keys/server.key"));

        assert!(!limits.is_denylisted("notas/paciente.txt"));
    }

    #[test]
    fn test_note_validation() {
        let limits = SafetyLimits {
            max_note_bytes: 10,
            ..Default::default()
        };

        assert!(limits.validate_note("febre").is_ok());
        assert_eq!(limits.validate_note("  \n"), Err(SafetyViolation::EmptyNote));
        assert!(matches!(
            limits.validate_note("febre alta persistente"),
            Err(SafetyViolation::MaxNoteBytes { actual: 22, limit: 10 })
        ));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let limits: SafetyLimits = serde_yaml::from_str("max_retries: 5").unwrap();
        assert_eq!(limits.max_retries, 5);
        assert_eq!(limits.max_note_bytes, 64 * 1024);
        assert_eq!(limits.denylist_patterns.len(), 5);
    }
}
