//! Note analysis: safety checks, prediction, evidence grounding.

use thiserror::Error;
use tracing::{debug, info};

use super::catalog::CidCatalog;
use super::safety::{SafetyLimits, SafetyViolation};
use crate::adapters::{PredictError, PredictionClient};
use crate::domain::{AnalysisSession, Prediction, PredictionResult, SessionError};

/// Why an analysis did not produce predictions
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error(transparent)]
    Safety(#[from] SafetyViolation),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Runs notes through the configured provider and grounds the answers
pub struct Analyzer {
    client: PredictionClient,
    catalog: CidCatalog,
    limits: SafetyLimits,
}

impl Analyzer {
    pub fn new(client: PredictionClient, catalog: CidCatalog, limits: SafetyLimits) -> Self {
        Self {
            client,
            catalog,
            limits,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.client.provider_name()
    }

    pub fn catalog(&self) -> &CidCatalog {
        &self.catalog
    }

    /// Validate the note and ask the provider for codes
    pub async fn predict(&self, note: &str) -> Result<PredictionResult, AnalyzeError> {
        self.limits.validate_note(note)?;
        debug!(note_len = note.len(), provider = self.provider_name(), "Requesting prediction");
        Ok(self.client.predict(note).await?)
    }

    /// Ground a prediction result in the note it was made for
    pub fn resolve(&self, note: &str, result: &PredictionResult) -> Vec<Prediction> {
        let predictions: Vec<Prediction> = result
            .cids
            .iter()
            .map(|predicted| {
                Prediction::resolve(predicted, note, self.catalog.describe(&predicted.code))
            })
            .collect();

        let unresolved: usize = predictions
            .iter()
            .map(|p| p.unresolved_phrases(note).len())
            .sum();
        info!(
            codes = predictions.len(),
            unresolved_phrases = unresolved,
            "Predictions grounded in note"
        );

        predictions
    }

    /// Predict and ground in one step
    pub async fn analyze(&self, note: &str) -> Result<Vec<Prediction>, AnalyzeError> {
        let result = self.predict(note).await?;
        Ok(self.resolve(note, &result))
    }

    /// Analyze the session's note, driving its request state machine
    ///
    /// Fails with `SessionError::Busy` if the session already has a request
    /// in flight.
    pub async fn analyze_session(&self, session: &mut AnalysisSession) -> Result<(), AnalyzeError> {
        let request_id = session.begin_request()?;
        let note = session.note().to_string();

        match self.analyze(&note).await {
            Ok(predictions) => {
                session.succeed(request_id, predictions)?;
                Ok(())
            }
            Err(e) => {
                session.fail(request_id, &e)?;
                Err(e)
            }
        }
    }
}
