//! Prediction client: provider selection, timeouts and transport retries.

use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use super::error::PredictError;
use super::huggingface::{GenerationParameters, HfTarget, HuggingFaceProvider};
use super::openai::{self, OpenAiProvider};
use super::{Provider, ProviderKind};
use crate::config::ProviderSettings;
use crate::core::SafetyLimits;
use crate::domain::PredictionResult;

/// Retry policy for transport failures
///
/// HTTP status errors and unparseable model output are never retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including first try)
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier (delay *= multiplier after each retry)
    pub backoff_multiplier: f64,

    /// Random extra delay, as a fraction of the computed delay (0.0 disables)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_retries` extra attempts after the first
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_attempts: max_retries + 1,
            ..Default::default()
        }
    }

    /// Calculate delay after a failed attempt (1-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::from_millis(self.initial_delay_ms.min(self.max_delay_ms));
        }

        let delay =
            self.initial_delay_ms as f64 * self.backoff_multiplier.powi((attempt - 1) as i32);

        let capped = delay.min(self.max_delay_ms as f64) as u64;
        Duration::from_millis(capped)
    }

    /// Delay for an attempt plus up to `jitter` of random extra wait
    pub fn jittered_delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.delay_for_attempt(attempt);
        if self.jitter <= 0.0 {
            return base;
        }

        // v4 UUIDs carry 122 random bits
        let random = (Uuid::new_v4().as_u128() % 10_000) as f64 / 10_000.0;
        base + base.mul_f64(self.jitter * random)
    }

    /// Check if we should retry based on attempt count
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Single entry point for predictions, whatever the provider
pub struct PredictionClient {
    provider: Box<dyn Provider>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl PredictionClient {
    /// Wrap a provider with default retry policy and a 120s timeout
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(120),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the configured provider
    pub fn from_settings(
        settings: &ProviderSettings,
        limits: &SafetyLimits,
    ) -> Result<Self, PredictError> {
        let provider = build_provider(settings)?;
        info!(provider = provider.name(), "Prediction provider configured");

        Ok(Self::new(provider)
            .with_retry_policy(RetryPolicy::with_max_retries(limits.max_retries))
            .with_timeout(Duration::from_secs(limits.request_timeout_seconds)))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Predict codes for a note, retrying transport failures
    pub async fn predict(&self, note: &str) -> Result<PredictionResult, PredictError> {
        let provider = self.provider.name();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = match tokio::time::timeout(self.timeout, self.provider.predict(note)).await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(PredictError::Timeout {
                    provider: provider.to_string(),
                    after: self.timeout,
                }),
            };

            match outcome {
                Ok(result) => {
                    info!(provider, attempt, codes = result.cids.len(), "Prediction succeeded");
                    return Ok(result);
                }
                Err(e) if e.is_retryable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.jittered_delay_for_attempt(attempt);
                    warn!(
                        provider,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Prediction failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(provider, attempt, error = %e, "Prediction failed");
                    return Err(e);
                }
            }
        }
    }
}

fn build_provider(settings: &ProviderSettings) -> Result<Box<dyn Provider>, PredictError> {
    let temperature = settings.temperature_or_default();
    let parameters = GenerationParameters {
        max_new_tokens: settings.max_new_tokens,
        temperature,
        return_full_text: false,
    };

    match settings.kind {
        ProviderKind::OpenAi => {
            let api_key = required(&settings.api_key, "OPENAI_API_KEY is not set")?;
            let base_url = settings
                .base_url
                .as_deref()
                .unwrap_or(openai::DEFAULT_BASE_URL);
            Ok(Box::new(
                OpenAiProvider::new(base_url, api_key, settings.model_or_default())
                    .with_temperature(temperature),
            ))
        }
        ProviderKind::HfInference => {
            let token = required(&settings.api_key, "HF_TOKEN is not set")?;
            let mut target = HfTarget::inference(settings.model_or_default());
            if let (HfTarget::Inference { base_url, .. }, Some(custom)) =
                (&mut target, settings.base_url.as_ref())
            {
                *base_url = custom.clone();
            }
            Ok(Box::new(HuggingFaceProvider::new(target, token, parameters)))
        }
        ProviderKind::HfEndpoint => {
            let token = required(&settings.api_key, "HF_TOKEN is not set")?;
            let url = required(
                &settings.endpoint_url,
                "endpoint_url is not set (config provider.endpoint_url or CIDLENS_ENDPOINT_URL)",
            )?;
            Ok(Box::new(HuggingFaceProvider::new(
                HfTarget::endpoint(url),
                token,
                parameters,
            )))
        }
    }
}

fn required(value: &Option<String>, message: &str) -> Result<String, PredictError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PredictError::Config(message.to_string()))
}
