//! Predicted codes, as returned by the model and as resolved against a note.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::evidence::{locate, merge_overlapping, Span};

/// Role of a predicted code in the diagnosis
///
/// The model answers in Portuguese. Unknown tags are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CodeKind {
    Principal,
    Secondary,
    Tertiary,
    Other(String),
}

impl Default for CodeKind {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for CodeKind {
    fn from(tag: String) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "principal" | "primary" => Self::Principal,
            "secundário" | "secundario" | "secondary" => Self::Secondary,
            "terciário" | "terciario" | "tertiary" => Self::Tertiary,
            _ => Self::Other(tag),
        }
    }
}

impl From<CodeKind> for String {
    fn from(kind: CodeKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for CodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeKind::Principal => write!(f, "principal"),
            CodeKind::Secondary => write!(f, "secundário"),
            CodeKind::Tertiary => write!(f, "terciário"),
            CodeKind::Other(tag) => write!(f, "{}", tag),
        }
    }
}

/// One code as emitted by the model (`{"cid", "tipo", "evidencia"}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedCode {
    /// ICD-10 code, e.g. "O24.4"
    #[serde(rename = "cid")]
    pub code: String,

    #[serde(rename = "tipo", default, deserialize_with = "null_as_default")]
    pub kind: CodeKind,

    /// Phrases the model claims support the code
    #[serde(rename = "evidencia", default, deserialize_with = "null_as_default")]
    pub evidence: Vec<String>,
}

/// Models sometimes send `null` for fields they have nothing to say about
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Full model answer (`{"cids": [...]}`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub cids: Vec<PredictedCode>,
}

impl PredictionResult {
    pub fn is_empty(&self) -> bool {
        self.cids.is_empty()
    }
}

/// A predicted code grounded in a specific note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub code: String,
    pub kind: CodeKind,

    /// Catalog description of the code
    pub label: String,

    pub evidence_phrases: Vec<String>,

    /// Every occurrence of every evidence phrase, sorted by start then end
    pub resolved_spans: Vec<Span>,
}

impl Prediction {
    /// Resolve a model prediction against the note it was made for
    pub fn resolve(predicted: &PredictedCode, note: &str, label: impl Into<String>) -> Self {
        Self {
            code: predicted.code.clone(),
            kind: predicted.kind.clone(),
            label: label.into(),
            evidence_phrases: predicted.evidence.clone(),
            resolved_spans: locate(note, &predicted.evidence),
        }
    }

    /// Spans ready for rendering (overlaps unioned)
    pub fn highlight_spans(&self, note: &str) -> Vec<Span> {
        merge_overlapping(note, &self.resolved_spans)
    }

    /// Evidence phrases that do not occur anywhere in the note
    pub fn unresolved_phrases<'a>(&'a self, note: &str) -> Vec<&'a str> {
        self.evidence_phrases
            .iter()
            .map(String::as_str)
            .filter(|p| !p.trim().is_empty())
            .filter(|p| locate(note, &[*p]).is_empty())
            .collect()
    }
}
