//! Analysis Session Integration Tests
//!
//! Tests for the request state machine driven through the analyzer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cidlens::adapters::{parse_prediction, PredictError, PredictionClient, Provider};
use cidlens::core::{AnalyzeError, Analyzer, CidCatalog, SafetyLimits, UNKNOWN_DESCRIPTION};
use cidlens::domain::{AnalysisSession, PredictionResult, SessionError, SessionState};

const NOTE: &str = "Gestante de 28 anos com Diabetes Gestacional e hipertensão leve.";

/// Provider answering with fixed model text
struct ScriptedProvider {
    text: String,
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn predict(&self, _note: &str) -> Result<PredictionResult, PredictError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(parse_prediction(&self.text)?)
    }
}

fn analyzer_with(text: &str) -> (Analyzer, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let provider = ScriptedProvider {
        text: text.to_string(),
        calls: Arc::clone(&calls),
    };
    let catalog =
        CidCatalog::from_json(r#"{"O24.4": "Diabetes mellitus que surge durante a gravidez"}"#)
            .unwrap();

    let analyzer = Analyzer::new(
        PredictionClient::new(Box::new(provider)),
        catalog,
        SafetyLimits::default(),
    );
    (analyzer, calls)
}

const ANSWER: &str = r#"{"cids": [
    {"cid": "O24.4", "tipo": "principal", "evidencia": ["diabetes gestacional", "glicemia alterada"]},
    {"cid": "O13", "tipo": "secundário", "evidencia": ["Hipertensão"]}
]}"#;

#[tokio::test]
async fn test_successful_analysis_grounds_predictions() {
    let (analyzer, calls) = analyzer_with(ANSWER);
    let mut session = AnalysisSession::new(NOTE);

    analyzer.analyze_session(&mut session).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(matches!(session.state(), SessionState::Success { .. }));

    let predictions = session.predictions();
    assert_eq!(predictions.len(), 2);

    let diabetes = &predictions[0];
    assert_eq!(diabetes.label, "Diabetes mellitus que surge durante a gravidez");
    assert_eq!(diabetes.resolved_spans.len(), 1);
    assert_eq!(diabetes.resolved_spans[0].text, "Diabetes Gestacional");
    assert_eq!(diabetes.unresolved_phrases(NOTE), vec!["glicemia alterada"]);

    let hypertension = &predictions[1];
    assert_eq!(hypertension.label, UNKNOWN_DESCRIPTION);
    assert_eq!(hypertension.resolved_spans[0].text, "hipertensão");
}

#[tokio::test]
async fn test_hover_and_leave_after_analysis() {
    let (analyzer, _) = analyzer_with(ANSWER);
    let mut session = AnalysisSession::new(NOTE);
    analyzer.analyze_session(&mut session).await.unwrap();

    let hovered = session.hover("o24.4").unwrap();
    let highlighted: Vec<&str> = hovered
        .iter()
        .filter(|s| s.highlighted)
        .map(|s| s.text.as_str())
        .collect();
    assert_eq!(highlighted, vec!["Diabetes Gestacional"]);

    let left = session.leave();
    assert_eq!(left.len(), 1);
    assert!(!left[0].highlighted);
    assert_eq!(left[0].text, NOTE);

    assert!(matches!(
        session.hover("Z99"),
        Err(SessionError::UnknownCode(_))
    ));
}

#[tokio::test]
async fn test_busy_session_is_not_sent() {
    let (analyzer, calls) = analyzer_with(ANSWER);
    let mut session = AnalysisSession::new(NOTE);
    let in_flight = session.begin_request().unwrap();

    let result = analyzer.analyze_session(&mut session).await;

    assert!(matches!(
        result,
        Err(AnalyzeError::Session(SessionError::Busy { request_id })) if request_id == in_flight
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(session.is_busy());
}

#[tokio::test]
async fn test_malformed_output_marks_session_failed() {
    let (analyzer, _) = analyzer_with("Desculpe, não consigo ajudar.");
    let mut session = AnalysisSession::new(NOTE);

    let result = analyzer.analyze_session(&mut session).await;

    assert!(matches!(result, Err(AnalyzeError::Predict(PredictError::Malformed(_)))));
    match session.state() {
        SessionState::Failed { error, .. } => assert!(error.contains("no JSON block")),
        other => panic!("expected failed state, got {:?}", other),
    }

    // A failed session accepts a new request
    assert!(session.begin_request().is_ok());
}

#[tokio::test]
async fn test_empty_note_never_reaches_provider() {
    let (analyzer, calls) = analyzer_with(ANSWER);
    let mut session = AnalysisSession::new("   \n");

    let result = analyzer.analyze_session(&mut session).await;

    assert!(matches!(result, Err(AnalyzeError::Safety(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(matches!(session.state(), SessionState::Failed { .. }));
}

#[test]
fn test_stale_completion_rejected() {
    let mut session = AnalysisSession::new(NOTE);
    let first = session.begin_request().unwrap();
    session.reset();
    let second = session.begin_request().unwrap();

    assert_eq!(
        session.succeed(first, Vec::new()),
        Err(SessionError::StaleRequest { request_id: first })
    );
    assert!(session.succeed(second, Vec::new()).is_ok());
}
