use crate::services::ai::{AiError, ReportRequest};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_hr;
use crate::web::session::CurrentSession;
use crate::web::{ok, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

const SUMMARY_FAILED: &str = "Failed to summarize feedback. Please try again.";
const REPORT_FAILED: &str = "Failed to generate report. Please try again.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizeRequest {
    pub feedback_text: String,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/summarize", post(summarize))
        .route("/report", post(report))
        .with_state(state)
}

/// Input problems surface as 400; anything on the model side is a 502 with a
/// fixed message.
fn ai_error(err: AiError, failure: &'static str) -> ApiError {
    match err {
        AiError::TooShort | AiError::MissingField(_) => ApiError::bad_request(err.to_string()),
        other => {
            tracing::error!("AI generation failed: {}", other);
            ApiError::upstream(failure)
        }
    }
}

async fn summarize(
    State(state): State<SharedState>,
    CurrentSession(_session): CurrentSession,
    payload: Result<Json<SummarizeRequest>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let summary = state
        .ai
        .summarize_feedback(&payload.feedback_text)
        .await
        .map_err(|e| ai_error(e, SUMMARY_FAILED))?;
    ok("summary", summary)
}

async fn report(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult {
    require_hr(&session)?;
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let report = state
        .ai
        .generate_report(&request)
        .await
        .map_err(|e| ai_error(e, REPORT_FAILED))?;
    ok("report", report)
}
