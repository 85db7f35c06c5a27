use crate::db::DEFAULT_ACTIVITY_LIMIT;
use crate::domain::models::{EmployeeFilter, FeedbackFilter, ReportFilter};
use crate::services::activity::log_activity;
use crate::services::export::{export_filename, render, ExportError, ExportFormat};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_hr;
use crate::web::session::CurrentSession;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/:dataset", get(export_dataset))
        .with_state(state)
}

async fn export_dataset(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(dataset): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    require_hr(&session)?;
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(export_error)?,
        None => ExportFormat::default(),
    };

    let records = collect_records(&state, &dataset).await?;
    let body = render(&records, format).map_err(export_error)?;
    let filename = export_filename(&dataset, format, Utc::now().date_naive());

    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "export",
        &format!("exported {dataset} as {}", format.extension()),
        Some(json!({ "dataset": dataset, "rows": records.len() })),
    )
    .await;

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Flattened rows per dataset; related records are reduced to a name or email
/// so the CSV stays one line per row.
async fn collect_records(state: &SharedState, dataset: &str) -> Result<Vec<Value>, ApiError> {
    let store = state.store.as_ref();
    let records = match dataset {
        "employees" => store
            .get_employees(&EmployeeFilter::default())
            .await?
            .into_iter()
            .map(|e| {
                let e = e.employee;
                json!({
                    "id": e.id,
                    "name": e.name,
                    "email": e.email,
                    "department": e.department,
                    "position": e.position,
                    "satisfactionScore": e.satisfaction_score,
                    "joinDate": e.join_date,
                })
            })
            .collect(),
        "feedback" => store
            .get_feedback(&FeedbackFilter::default())
            .await?
            .into_iter()
            .map(|f| {
                json!({
                    "id": f.feedback.id,
                    "employee": f.employee.name,
                    "department": f.employee.department,
                    "category": f.feedback.category,
                    "sentiment": f.feedback.sentiment,
                    "feedback": f.feedback.feedback,
                    "author": f.author.name,
                    "createdAt": f.feedback.created_at,
                })
            })
            .collect(),
        "activity" => store
            .get_activity_logs(DEFAULT_ACTIVITY_LIMIT)
            .await?
            .into_iter()
            .map(|entry| {
                json!({
                    "id": entry.log.id,
                    "action": entry.log.action,
                    "description": entry.log.description,
                    "user": entry.log.user_name,
                    "role": entry.user.role,
                    "metadata": entry.log.metadata,
                    "createdAt": entry.log.created_at,
                })
            })
            .collect(),
        "reports" => store
            .get_reports(&ReportFilter::default())
            .await?
            .into_iter()
            .map(|r| {
                json!({
                    "id": r.report.id,
                    "title": r.report.title,
                    "type": r.report.kind,
                    "createdBy": r.created_by.email,
                    "data": r.report.data,
                    "createdAt": r.report.created_at,
                })
            })
            .collect(),
        other => return Err(ApiError::not_found(format!("Unknown export dataset: {other}"))),
    };
    Ok(records)
}

fn export_error(err: ExportError) -> ApiError {
    match err {
        ExportError::Empty => ApiError::not_found(err.to_string()),
        ExportError::Format(_) => ApiError::bad_request(err.to_string()),
        ExportError::Serialize(e) => {
            tracing::error!("Export serialization failed: {}", e);
            ApiError::internal("Failed to export data")
        }
    }
}
