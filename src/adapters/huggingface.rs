//! Hugging Face text-generation adapter.
//!
//! Covers both the shared inference API (`/models/{model_id}`) and dedicated
//! inference endpoints. They accept the same payload: a raw Llama-3
//! chat-template prompt plus generation parameters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::PredictError;
use super::repair::parse_prediction;
use super::{prompt, status_error, Provider};
use crate::domain::PredictionResult;

/// Default host of the shared inference API
pub const DEFAULT_INFERENCE_URL: &str = "https://api-inference.huggingface.co";

/// Where generation requests are sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HfTarget {
    /// Shared inference API for a hub model
    Inference { base_url: String, model_id: String },

    /// Dedicated endpoint URL
    Endpoint { url: String },
}

impl HfTarget {
    /// Shared inference API on the public host
    pub fn inference(model_id: impl Into<String>) -> Self {
        Self::Inference {
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            model_id: model_id.into(),
        }
    }

    pub fn endpoint(url: impl Into<String>) -> Self {
        Self::Endpoint { url: url.into() }
    }

    fn url(&self) -> String {
        match self {
            HfTarget::Inference { base_url, model_id } => {
                format!("{}/models/{}", base_url.trim_end_matches('/'), model_id)
            }
            HfTarget::Endpoint { url } => url.clone(),
        }
    }
}

/// Text-generation parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub temperature: f64,
    /// Must stay false: the prompt would otherwise be echoed back
    pub return_full_text: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: 500,
            temperature: 0.1,
            return_full_text: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    inputs: String,
    parameters: &'a GenerationParameters,
}

/// The API answers with a list for hub models and sometimes a bare object
/// for dedicated endpoints
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerationResponse {
    Many(Vec<Generated>),
    One(Generated),
}

#[derive(Debug, Deserialize)]
struct Generated {
    #[serde(default)]
    generated_text: Option<String>,

    /// Loading models and rejected inputs can come back as 200 with an error
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl Generated {
    fn error_message(&self) -> Option<String> {
        let error = self.error.as_ref().filter(|e| !e.is_null())?;
        Some(match error {
            serde_json::Value::String(message) => message.clone(),
            other => other.to_string(),
        })
    }
}

impl GenerationResponse {
    fn into_first(self) -> Option<Generated> {
        match self {
            GenerationResponse::Many(items) => items.into_iter().next(),
            GenerationResponse::One(item) => Some(item),
        }
    }
}

/// Hugging Face provider
pub struct HuggingFaceProvider {
    name: String,
    target: HfTarget,
    token: String,
    parameters: GenerationParameters,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    pub fn new(target: HfTarget, token: impl Into<String>, parameters: GenerationParameters) -> Self {
        let name = match target {
            HfTarget::Inference { .. } => "hf_inference",
            HfTarget::Endpoint { .. } => "hf_endpoint",
        };

        Self {
            name: name.to_string(),
            target,
            token: token.into(),
            parameters,
            client: reqwest::Client::new(),
        }
    }

    fn transport(&self, source: reqwest::Error) -> PredictError {
        PredictError::Transport {
            provider: self.name.clone(),
            source,
        }
    }
}

#[async_trait]
impl Provider for HuggingFaceProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn predict(&self, note: &str) -> Result<PredictionResult, PredictError> {
        let url = self.target.url();
        debug!(provider = %self.name, %url, note_len = note.len(), "Sending generation request");

        let request = GenerationRequest {
            inputs: prompt::llama3_prompt(note),
            parameters: &self.parameters,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport(e))?;

        if !status.is_success() {
            return Err(status_error(&self.name, status.as_u16(), &body));
        }

        let parsed: GenerationResponse =
            serde_json::from_str(&body).map_err(|e| PredictError::UnexpectedResponse {
                provider: self.name.clone(),
                reason: e.to_string(),
            })?;

        let generated = parsed.into_first();
        if let Some(reason) = generated.as_ref().and_then(Generated::error_message) {
            return Err(PredictError::UnexpectedResponse {
                provider: self.name.clone(),
                reason,
            });
        }

        let text = generated
            .and_then(|g| g.generated_text)
            .filter(|t| !t.trim().is_empty())
            .ok_or(PredictError::EmptyResponse)?;

        debug!(provider = %self.name, text_len = text.len(), "Received generated text");
        Ok(parse_prediction(&text)?)
    }
}
