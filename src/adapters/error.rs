//! Prediction failure taxonomy.
//!
//! Every failure mode carries its own user-visible message. Only transport
//! failures are worth retrying.

use std::time::Duration;

use thiserror::Error;

/// The model answered, but no usable JSON could be recovered from its text
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedOutput {
    #[error("no JSON block found in the model output")]
    NoJsonBlock,

    #[error("model output is not valid prediction JSON, even after quote repair: {0}")]
    Unparseable(String),
}

/// Errors from a prediction provider
#[derive(Debug, Error)]
pub enum PredictError {
    /// Network-level failure (connect, DNS, TLS, broken body)
    #[error("could not reach {provider}: {source}")]
    Transport {
        provider: String,
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the configured timeout
    #[error("{provider} did not answer within {after:?}")]
    Timeout { provider: String, after: Duration },

    /// Non-2xx answer from the provider
    #[error("{provider} returned HTTP {status}: {error}")]
    Status {
        provider: String,
        status: u16,
        error: String,
        details: Option<String>,
    },

    /// 2xx answer whose envelope is not what the provider documents
    #[error("unexpected response from {provider}: {reason}")]
    UnexpectedResponse { provider: String, reason: String },

    #[error("the model returned an empty response")]
    EmptyResponse,

    #[error(transparent)]
    Malformed(#[from] MalformedOutput),

    /// Missing token, URL or model name
    #[error("provider is not configured: {0}")]
    Config(String),
}

impl PredictError {
    /// Whether the same request may succeed if sent again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PredictError::Transport { .. } | PredictError::Timeout { .. }
        )
    }

    /// Extra detail for error payloads, if any
    pub fn details(&self) -> Option<String> {
        match self {
            PredictError::Status { details, .. } => details.clone(),
            PredictError::Transport { source, .. } => Some(source.to_string()),
            PredictError::Malformed(_) => Some(
                "The model produced invalid JSON. Try again or adjust the clinical note."
                    .to_string(),
            ),
            _ => None,
        }
    }
}
