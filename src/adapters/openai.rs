//! OpenAI chat-completions adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::error::PredictError;
use super::repair::parse_prediction;
use super::{prompt, status_error, Provider};
use crate::domain::PredictionResult;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

/// OpenAI-compatible chat completions provider
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(base_url: &str, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.0,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    fn transport(&self, source: reqwest::Error) -> PredictError {
        PredictError::Transport {
            provider: self.name().to_string(),
            source,
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn predict(&self, note: &str) -> Result<PredictionResult, PredictError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        debug!(model = %self.model, note_len = note.len(), "Sending chat completion request");

        let messages = [
            ChatMessage {
                role: "system",
                content: prompt::SYSTEM_PROMPT.to_string(),
            },
            ChatMessage {
                role: "user",
                content: prompt::user_message(note),
            },
        ];

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "temperature": self.temperature,
                "response_format": { "type": "json_object" },
            }))
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport(e))?;

        if !status.is_success() {
            return Err(status_error(self.name(), status.as_u16(), &body));
        }

        let completion: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| PredictError::UnexpectedResponse {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(PredictError::EmptyResponse)?;

        Ok(parse_prediction(&text)?)
    }
}
