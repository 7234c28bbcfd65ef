//! HTTP surface for the filing digest service.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /filings` – Run the full ingestion pipeline for one filing and return the
//!   comprehensive report reference. Re-posting a completed filing returns the existing
//!   reference without re-processing.
//! - `GET /filings/:accession/status` – Inspect a filing's stage, structure counts, and
//!   any recorded failure.
//! - `POST /questions` – Answer a question against one indexed filing with source
//!   provenance. Infrastructure failures render an answer-unavailable body rather than
//!   an opaque 5xx.
//! - `GET /metrics` – Observe pipeline counters.

use crate::filing::{ChunkType, Filing};
use crate::pipeline::{PipelineApi, PipelineError};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_FORM_TYPE: &str = "10-K";

/// Build the HTTP router exposing the pipeline API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: PipelineApi + 'static,
{
    Router::new()
        .route("/filings", post(process_filing::<S>))
        .route("/filings/:accession/status", get(filing_status::<S>))
        .route("/questions", post(ask_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(service)
}

/// Request body for the `POST /filings` endpoint.
#[derive(Deserialize)]
struct ProcessRequest {
    /// Ticker symbol the filing belongs to.
    ticker: String,
    /// Accession identifier of the filing.
    accession: String,
    /// Form type, e.g. `10-K`. Defaults to `10-K` when omitted.
    #[serde(default)]
    form_type: Option<String>,
}

/// Success response for the `POST /filings` endpoint.
#[derive(Serialize)]
struct ProcessResponse {
    report_id: String,
    report_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_url: Option<String>,
}

/// Process a filing end to end and return its report reference.
async fn process_filing<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<ProcessRequest>,
) -> Result<Json<ProcessResponse>, AppError>
where
    S: PipelineApi,
{
    let form_type = request.form_type.as_deref().unwrap_or(DEFAULT_FORM_TYPE);
    let reference = service
        .process_filing(&request.ticker, &request.accession, form_type)
        .await?;
    tracing::info!(
        ticker = request.ticker,
        accession = request.accession,
        report_id = reference.report_id,
        "Filing request completed"
    );
    Ok(Json(ProcessResponse {
        report_id: reference.report_id,
        report_key: reference.report_key,
        report_url: reference.report_url,
    }))
}

/// Response body for `GET /filings/:accession/status`.
#[derive(Serialize)]
struct StatusResponse {
    accession: String,
    ticker: String,
    form_type: String,
    status: &'static str,
    sections: usize,
    summarization_chunks: usize,
    embedding_chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<Filing> for StatusResponse {
    fn from(filing: Filing) -> Self {
        Self {
            status: filing.status.as_str(),
            sections: filing.sections.len(),
            summarization_chunks: filing.chunks_of(ChunkType::Summarization).len(),
            embedding_chunks: filing.chunks_of(ChunkType::Embedding).len(),
            accession: filing.accession,
            ticker: filing.ticker,
            form_type: filing.form_type,
            report_id: filing.report_id,
            error: filing.error,
        }
    }
}

/// Report a filing's current pipeline stage.
async fn filing_status<S>(
    State(service): State<Arc<S>>,
    Path(accession): Path<String>,
) -> Result<Json<StatusResponse>, AppError>
where
    S: PipelineApi,
{
    match service.get_status(&accession).await {
        Some(filing) => Ok(Json(filing.into())),
        None => Err(AppError::NotFound(accession)),
    }
}

/// Request body for the `POST /questions` endpoint.
#[derive(Deserialize)]
struct QuestionRequest {
    /// Ticker symbol the filing belongs to.
    ticker: String,
    /// Accession identifier of the filing.
    accession: String,
    /// Natural-language question.
    question: String,
    /// Number of chunks to retrieve for this question; the configured default applies
    /// when omitted.
    #[serde(default)]
    top_k: Option<usize>,
}

/// Response body for the `POST /questions` endpoint.
#[derive(Serialize)]
struct QuestionResponse {
    answer: String,
    sources: Vec<crate::qa::SourceRef>,
    answered: bool,
}

/// Answer a question scoped to one indexed filing.
///
/// Retrieval-time infrastructure failures are rendered as an unanswered response body so
/// clients can distinguish "nothing found" from "could not look".
async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QuestionRequest>,
) -> Json<QuestionResponse>
where
    S: PipelineApi,
{
    match service
        .answer(
            &request.ticker,
            &request.accession,
            &request.question,
            request.top_k,
        )
        .await
    {
        Ok(answer) => Json(QuestionResponse {
            answer: answer.answer,
            sources: answer.sources,
            answered: true,
        }),
        Err(error) => {
            tracing::warn!(
                accession = request.accession,
                error = %error,
                "Question could not be answered"
            );
            Json(QuestionResponse {
                answer: "The question could not be answered due to a retrieval failure."
                    .to_string(),
                sources: Vec::new(),
                answered: false,
            })
        }
    }
}

/// Return the pipeline counters snapshot.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<crate::metrics::MetricsSnapshot>
where
    S: PipelineApi,
{
    Json(service.metrics_snapshot())
}

enum AppError {
    Pipeline(PipelineError),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound(accession) => (
                StatusCode::NOT_FOUND,
                format!("unknown filing: {accession}"),
            )
                .into_response(),
            Self::Pipeline(error) => {
                let status = match &error {
                    PipelineError::InProgress { .. } => StatusCode::CONFLICT,
                    PipelineError::PreviouslyFailed { .. } => StatusCode::CONFLICT,
                    PipelineError::Source(crate::source::SourceError::NotFound { .. }) => {
                        StatusCode::NOT_FOUND
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, error.to_string()).into_response()
            }
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(inner: PipelineError) -> Self {
        Self::Pipeline(inner)
    }
}
