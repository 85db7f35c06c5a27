use crate::domain::models::{NewReport, ReportFilter};
use crate::services::activity::log_activity;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_hr;
use crate::web::session::CurrentSession;
use crate::web::{ok, ok_empty, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ReportPayload {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: Value,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_reports).post(create_report))
        .route("/:id", delete(delete_report))
        .with_state(state)
}

async fn list_reports(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Query(filter): Query<ReportFilter>,
) -> ApiResult {
    require_hr(&session)?;
    let reports = state
        .store
        .get_reports(&filter)
        .await
        .map_err(|e| ApiError::from(e).with_default("reports", json!([])))?;
    ok("reports", reports)
}

async fn create_report(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<ReportPayload>, JsonRejection>,
) -> ApiResult {
    require_hr(&session)?;
    let Json(payload) = payload.map_err(|_| ApiError::bad_request("Missing required fields"))?;
    if payload.title.trim().is_empty() || payload.kind.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }
    let data = match payload.data {
        Value::Null => json!({}),
        other => other,
    };

    let report = state
        .store
        .create_report(NewReport {
            title: payload.title,
            kind: payload.kind,
            data,
            created_by_id: session.user.id,
        })
        .await?;
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "export",
        &format!("generated report \"{}\"", report.report.title),
        Some(json!({ "reportId": report.report.id, "type": report.report.kind })),
    )
    .await;
    ok("report", report)
}

async fn delete_report(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> ApiResult {
    require_hr(&session)?;
    state.store.delete_report(id).await?;
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "delete",
        "deleted a report",
        Some(json!({ "reportId": id })),
    )
    .await;
    ok_empty()
}
