//! HTTP service.
//!
//! - `POST /api/predict`: `{ "clinicalNote" }` → `{ "cids": [...] }`, plus
//!   grounded `predictions` with `?evidence=true`
//! - `POST /api/validate`: record a clinician verdict
//! - `GET /healthz`

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn};

use crate::adapters::{PredictError, PredictionClient};
use crate::config::ResolvedConfig;
use crate::core::{AnalyzeError, Analyzer, CidCatalog, FeedbackLog};
use crate::domain::{FeedbackRecord, PredictedCode, Prediction, Verdict};

type SharedState = Arc<AppState>;

pub struct AppState {
    pub analyzer: Analyzer,
    pub feedback: FeedbackLog,
}

impl AppState {
    pub fn new(analyzer: Analyzer, feedback: FeedbackLog) -> Self {
        Self { analyzer, feedback }
    }

    /// Build provider, catalog and feedback log from configuration
    pub async fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let client = PredictionClient::from_settings(&config.provider, &config.safety)
            .context("Failed to configure prediction provider")?;
        let catalog = CidCatalog::load(&config.catalog).await?;
        let analyzer = Analyzer::new(client, catalog, config.safety.clone());

        Ok(Self::new(analyzer, FeedbackLog::new(config.feedback_path())))
    }
}

/// Bind `address` and serve until Ctrl-C or SIGTERM
pub async fn serve(address: &str, state: AppState) -> Result<()> {
    let addr: SocketAddr = address
        .parse()
        .with_context(|| format!("Invalid listen address: {}", address))?;

    let router = build_router(Arc::new(state));
    info!(%addr, "Binding HTTP listener");

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("HTTP server exited");
    Ok(())
}

pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/predict", post(api_predict))
        .route("/api/validate", post(api_validate))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// JSON error body: `{ "error", "details"? }`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn with_details(mut self, details: Option<String>) -> Self {
        self.details = details;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = match self.details {
            Some(details) => json!({ "error": self.message, "details": details }),
            None => json!({ "error": self.message }),
        };
        (self.status, Json(payload)).into_response()
    }
}

impl From<AnalyzeError> for ApiError {
    fn from(err: AnalyzeError) -> Self {
        let status = match &err {
            AnalyzeError::Safety(_) => StatusCode::BAD_REQUEST,
            AnalyzeError::Predict(predict) => match predict {
                PredictError::Transport { .. }
                | PredictError::Timeout { .. }
                | PredictError::Status { .. }
                | PredictError::UnexpectedResponse { .. } => StatusCode::BAD_GATEWAY,
                PredictError::EmptyResponse | PredictError::Malformed(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PredictError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AnalyzeError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &err {
            AnalyzeError::Predict(predict) => predict.details(),
            _ => None,
        };

        Self::new(status, err.to_string()).with_details(details)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid JSON body").with_details(Some(rejection.body_text()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PredictRequest {
    #[serde(default)]
    clinical_note: String,
}

#[derive(Debug, Default, Deserialize)]
struct PredictParams {
    #[serde(default)]
    evidence: bool,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    cids: Vec<PredictedCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predictions: Option<Vec<Prediction>>,
}

async fn api_predict(
    State(state): State<SharedState>,
    Query(params): Query<PredictParams>,
    body: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = body?;
    let note = request.clinical_note;

    let result = state.analyzer.predict(&note).await.map_err(|e| {
        warn!(error = %e, "Prediction request failed");
        ApiError::from(e)
    })?;

    let predictions = params
        .evidence
        .then(|| state.analyzer.resolve(&note, &result));

    Ok(Json(PredictResponse {
        cids: result.cids,
        predictions,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    cid: String,
    validation: Verdict,
    #[serde(default)]
    clinical_note: Option<String>,
}

async fn api_validate(
    State(state): State<SharedState>,
    body: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<FeedbackRecord>, ApiError> {
    let Json(request) = body?;
    if request.cid.trim().is_empty() {
        return Err(ApiError::bad_request("Field `cid` is required"));
    }

    let record = FeedbackRecord::new(
        &request.cid,
        request.validation,
        request.clinical_note.as_deref(),
    );

    let log = state.feedback.clone();
    let to_append = record.clone();
    tokio::task::spawn_blocking(move || log.append(&to_append))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record feedback")
                .with_details(Some(format!("{:#}", e)))
        })?;

    Ok(Json(record))
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "provider": state.analyzer.provider_name(),
        "catalog_codes": state.analyzer.catalog().len(),
    }))
}
