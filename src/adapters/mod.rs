//! Prediction providers.
//!
//! Every hosted model that can turn a clinical note into ICD-10 codes sits
//! behind the [`Provider`] trait. Which one is used is a configuration
//! choice; [`PredictionClient`] adds timeouts and transport retries on top.

pub mod client;
pub mod error;
pub mod huggingface;
pub mod openai;
pub mod prompt;
pub mod repair;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::PredictionResult;

pub use client::{PredictionClient, RetryPolicy};
pub use error::{MalformedOutput, PredictError};
pub use huggingface::{GenerationParameters, HfTarget, HuggingFaceProvider};
pub use openai::OpenAiProvider;
pub use repair::parse_prediction;

/// A hosted model that predicts ICD-10 codes for a note
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name used in logs and error messages
    fn name(&self) -> &str;

    /// Ask the model for codes and evidence phrases for `note`
    async fn predict(&self, note: &str) -> Result<PredictionResult, PredictError>;
}

/// Supported provider strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// OpenAI chat completions
    #[serde(rename = "openai")]
    OpenAi,

    /// Hugging Face shared inference API (`/models/{id}`)
    HfInference,

    /// Hugging Face dedicated inference endpoint
    HfEndpoint,
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::HfEndpoint
    }
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::HfInference => "hf_inference",
            ProviderKind::HfEndpoint => "hf_endpoint",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "hf_inference" | "huggingface" => Ok(ProviderKind::HfInference),
            "hf_endpoint" => Ok(ProviderKind::HfEndpoint),
            other => Err(format!(
                "Unknown provider '{}' (expected openai, hf_inference or hf_endpoint)",
                other
            )),
        }
    }
}

/// Build a `PredictError::Status` from a non-2xx response body
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}` and an
/// optional `"details"` field; anything else is reported verbatim (truncated).
pub(crate) fn status_error(provider: &str, status: u16, body: &str) -> PredictError {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

    let error = parsed
        .as_ref()
        .and_then(|v| v.get("error"))
        .and_then(|e| {
            e.as_str()
                .map(str::to_string)
                .or_else(|| e.get("message").and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| truncate(body.trim(), 200));

    let details = parsed
        .as_ref()
        .and_then(|v| v.get("details"))
        .and_then(|d| d.as_str())
        .map(str::to_string);

    PredictError::Status {
        provider: provider.to_string(),
        status,
        error,
        details,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("openai".parse::<ProviderKind>(), Ok(ProviderKind::OpenAi));
        assert_eq!(
            "HF_ENDPOINT".parse::<ProviderKind>(),
            Ok(ProviderKind::HfEndpoint)
        );
        assert!("llama".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_provider_kind_yaml_names() {
        let kind: ProviderKind = serde_yaml::from_str("openai").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
        let kind: ProviderKind = serde_yaml::from_str("hf_inference").unwrap();
        assert_eq!(kind, ProviderKind::HfInference);
    }

    #[test]
    fn test_status_error_shapes() {
        let err = status_error("hf", 503, r#"{"error": "Model is loading"}"#);
        assert!(matches!(
            err,
            PredictError::Status { status: 503, ref error, .. } if error == "Model is loading"
        ));

        let err = status_error("openai", 401, r#"{"error": {"message": "bad key"}}"#);
        assert!(matches!(err, PredictError::Status { ref error, .. } if error == "bad key"));

        let err = status_error("x", 500, r#"{"error": "boom", "details": "stack"}"#);
        assert_eq!(err.details(), Some("stack".to_string()));

        let err = status_error("x", 502, "Bad Gateway");
        assert!(matches!(err, PredictError::Status { ref error, .. } if error == "Bad Gateway"));
    }
}
