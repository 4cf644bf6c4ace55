//! Clinician feedback on predicted codes.
//!
//! A record never contains the note itself, only its SHA-256.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Clinician verdict on one predicted code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Correct,
    Incorrect,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Correct => "correct",
            Verdict::Incorrect => "incorrect",
        }
    }
}

/// One line of feedback.jsonl
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub ts: DateTime<Utc>,

    /// Code the verdict applies to, uppercased
    pub code: String,

    pub verdict: Verdict,

    /// Hash of the note the code was predicted for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_sha256: Option<String>,
}

impl FeedbackRecord {
    pub fn new(code: &str, verdict: Verdict, note: Option<&str>) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts: Utc::now(),
            code: code.trim().to_uppercase(),
            verdict,
            note_sha256: note.map(|n| compute_hash(n.as_bytes())),
        }
    }
}

/// SHA-256 of a byte slice as "sha256:<hex>"
pub fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
