// HTTP route handlers for the Arbiter API
//
// Handlers stay thin: extract, call the judge, map the outcome. Every
// judging decision lives in arbiter-judge.

use arbiter_common::types::{Submission, TestCase};
use arbiter_judge::{JudgeError, ReferenceSolution, RunReport, SubmissionSummary};
use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::{metrics, AppState};

/// Header carrying the caller identity, set by the upstream auth proxy
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub test_cases: Vec<TestCase>,
    pub reference_solutions: Vec<ReferenceSolution>,
}

#[derive(Debug, Serialize)]
pub struct SolvedResponse {
    pub solved: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Authenticated caller
pub struct UserId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| UserId(v.to_string()))
            .ok_or(ApiError::Unauthenticated)
    }
}

#[derive(Debug)]
pub enum ApiError {
    Unauthenticated,
    Judge(JudgeError),
}

impl From<JudgeError> for ApiError {
    fn from(e: JudgeError) -> Self {
        ApiError::Judge(e)
    }
}

pub fn status_for(err: &JudgeError) -> StatusCode {
    match err {
        JudgeError::UnsupportedLanguage(_)
        | JudgeError::InvalidInput(_)
        | JudgeError::NoTestCases(_)
        | JudgeError::ReferenceRejected { .. } => StatusCode::BAD_REQUEST,
        JudgeError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
        JudgeError::RemoteUnavailable(_) | JudgeError::RemoteProtocolError(_) => {
            StatusCode::BAD_GATEWAY
        }
        JudgeError::JudgingTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        JudgeError::Store(_) | JudgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    error: "unauthenticated",
                    message: format!("missing {} header", USER_ID_HEADER),
                },
            ),
            ApiError::Judge(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    error!(kind = e.kind(), error = %e, "Request failed");
                }
                (
                    status,
                    ErrorBody {
                        error: e.kind(),
                        message: e.to_string(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn language_label(state: &AppState, language: &str) -> String {
    state
        .judge
        .languages()
        .canonical_name(language)
        .unwrap_or("unsupported")
        .to_string()
}

/// POST /run/:problem_id - Run code against the visible test cases
pub async fn run_code(
    State(state): State<Arc<AppState>>,
    Path(problem_id): Path<String>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<RunReport>, ApiError> {
    metrics::record_judging("run", &language_label(&state, &payload.language));
    let started = Instant::now();

    match state
        .judge
        .run_against_visible(&problem_id, &payload.code, &payload.language)
        .await
    {
        Ok(report) => {
            metrics::record_verdict("run", &report.verdict.status.to_string(), started.elapsed());
            Ok(Json(report))
        }
        Err(e) => {
            metrics::record_failure("run", e.kind(), started.elapsed());
            Err(e.into())
        }
    }
}

/// POST /submit/:problem_id - Judge code against the hidden test cases
pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(problem_id): Path<String>,
    Json(payload): Json<CodeRequest>,
) -> Result<Json<SubmissionSummary>, ApiError> {
    metrics::record_judging("submit", &language_label(&state, &payload.language));
    let started = Instant::now();

    match state
        .judge
        .submit_against_hidden(&user_id, &problem_id, &payload.code, &payload.language)
        .await
    {
        Ok(summary) => {
            info!(
                submission_id = %summary.submission_id,
                user_id = %user_id,
                status = %summary.status,
                "Submission judged"
            );
            metrics::record_verdict("submit", &summary.status.to_string(), started.elapsed());
            Ok(Json(summary))
        }
        Err(e) => {
            warn!(user_id = %user_id, problem_id = %problem_id, kind = e.kind(), "Submission failed");
            metrics::record_failure("submit", e.kind(), started.elapsed());
            Err(e.into())
        }
    }
}

/// GET /submissions/:problem_id - The caller's submissions, newest first
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
    Path(problem_id): Path<String>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    let submissions = state.judge.lifecycle().history(&user_id, &problem_id).await?;
    Ok(Json(submissions))
}

/// DELETE /submissions - Cascading purge of the caller's data
pub async fn purge_submissions(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<PurgeResponse>, ApiError> {
    let removed = state.judge.lifecycle().purge_user(&user_id).await?;
    Ok(Json(PurgeResponse { removed }))
}

/// GET /solved
pub async fn solved_problems(
    State(state): State<Arc<AppState>>,
    UserId(user_id): UserId,
) -> Result<Json<SolvedResponse>, ApiError> {
    let solved = state.judge.lifecycle().solved(&user_id).await?;
    Ok(Json(SolvedResponse { solved }))
}

/// POST /problems/validate - Check reference solutions before publishing a problem
pub async fn validate_problem(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ValidateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    metrics::record_judging("validate", "reference");
    let started = Instant::now();

    match state
        .judge
        .validate_reference_solutions(&payload.test_cases, &payload.reference_solutions)
        .await
    {
        Ok(()) => {
            metrics::record_verdict("validate", "accepted", started.elapsed());
            Ok(Json(serde_json::json!({ "valid": true })))
        }
        Err(e) => {
            metrics::record_failure("validate", e.kind(), started.elapsed());
            Err(e.into())
        }
    }
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics_handler() -> Response {
    match metrics::render_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
