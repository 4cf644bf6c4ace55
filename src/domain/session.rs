//! Analysis session state.
//!
//! An `AnalysisSession` owns everything one user works on at a time: the
//! note text, the lifecycle of the prediction request for that note, and the
//! predictions it produced. At most one request is in flight per session:
//!
//! ```text
//! Idle ──begin_request──▶ Requesting ──succeed──▶ Success ─┐
//!  ▲                           └──────fail──────▶ Failed  ─┤
//!  └──────────────── reset / set_note / begin_request ─────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::prediction::Prediction;
use crate::evidence::{render, HighlightSegment, SpanError};

/// State of the session's prediction request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SessionState {
    /// No request issued, or results discarded
    Idle,

    /// A request is in flight
    Requesting {
        request_id: Uuid,
        started_at: DateTime<Utc>,
    },

    /// The last request produced predictions
    Success {
        request_id: Uuid,
        predictions: Vec<Prediction>,
    },

    /// The last request failed
    Failed { request_id: Uuid, error: String },
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Session transition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a prediction request is already in progress ({request_id})")]
    Busy { request_id: Uuid },

    #[error("request {request_id} is not the request in progress")]
    StaleRequest { request_id: Uuid },

    #[error("no prediction for code {0}")]
    UnknownCode(String),

    #[error(transparent)]
    Render(#[from] SpanError),
}

/// One user's working session over a single note
#[derive(Debug, Clone, Default)]
pub struct AnalysisSession {
    note: String,
    state: SessionState,
}

impl AnalysisSession {
    /// Create an idle session for a note
    pub fn new(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            state: SessionState::Idle,
        }
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Whether a request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self.state, SessionState::Requesting { .. })
    }

    /// Replace the note text, discarding any previous predictions
    ///
    /// Rejected while a request is in flight, since its predictions will be
    /// resolved against the current note.
    pub fn set_note(&mut self, note: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_not_busy()?;
        self.note = note.into();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Start a new prediction request
    ///
    /// Returns the request id that must be passed back to `succeed`/`fail`.
    pub fn begin_request(&mut self) -> Result<Uuid, SessionError> {
        self.ensure_not_busy()?;
        let request_id = Uuid::new_v4();
        self.state = SessionState::Requesting {
            request_id,
            started_at: Utc::now(),
        };
        Ok(request_id)
    }

    /// Record the predictions of the in-flight request
    pub fn succeed(
        &mut self,
        request_id: Uuid,
        predictions: Vec<Prediction>,
    ) -> Result<(), SessionError> {
        self.ensure_in_flight(request_id)?;
        self.state = SessionState::Success {
            request_id,
            predictions,
        };
        Ok(())
    }

    /// Record the failure of the in-flight request
    pub fn fail(&mut self, request_id: Uuid, error: impl ToString) -> Result<(), SessionError> {
        self.ensure_in_flight(request_id)?;
        self.state = SessionState::Failed {
            request_id,
            error: error.to_string(),
        };
        Ok(())
    }

    /// Return to idle, discarding predictions (tab switch, new analysis)
    ///
    /// Resetting while a request is in flight abandons it: its eventual
    /// completion is rejected as stale.
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
    }

    /// Predictions of the last successful request
    pub fn predictions(&self) -> &[Prediction] {
        match &self.state {
            SessionState::Success { predictions, .. } => predictions,
            _ => &[],
        }
    }

    /// Render the note with the evidence of `code` highlighted (pointer enter)
    pub fn hover(&self, code: &str) -> Result<Vec<HighlightSegment>, SessionError> {
        let prediction = self
            .predictions()
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| SessionError::UnknownCode(code.to_string()))?;

        let spans = prediction.highlight_spans(&self.note);
        Ok(render(&self.note, &spans)?)
    }

    /// Render the note without highlights (pointer leave)
    pub fn leave(&self) -> Vec<HighlightSegment> {
        // An empty span list is always valid
        render(&self.note, &[]).unwrap_or_default()
    }

    fn ensure_not_busy(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Requesting { request_id, .. } => Err(SessionError::Busy { request_id }),
            _ => Ok(()),
        }
    }

    fn ensure_in_flight(&self, request_id: Uuid) -> Result<(), SessionError> {
        match self.state {
            SessionState::Requesting {
                request_id: current,
                ..
            } if current == request_id => Ok(()),
            _ => Err(SessionError::StaleRequest { request_id }),
        }
    }
}
