use crate::domain::models::{
    non_empty, FeedbackFilter, NewFeedback, NewNotification, NotificationType, Sentiment,
    UserRole,
};
use crate::services::activity::log_activity;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_api_role;
use crate::web::pages::resolve_employee;
use crate::web::session::CurrentSession;
use crate::web::{ok, ok_empty, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

const MISSING_FIELDS: &str = "Missing required fields";
const CREATE_FAILED: &str = "Failed to create feedback";

/// Raw submission body. Every field is required and non-empty.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackPayload {
    pub employee_id: Option<String>,
    pub category: Option<String>,
    pub sentiment: Option<String>,
    pub feedback: Option<String>,
    pub author_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedbackQuery {
    pub employee_id: Option<String>,
    pub sentiment: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_feedback).post(create_feedback))
        .route("/:id", delete(delete_feedback))
        .with_state(state)
}

async fn list_feedback(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<FeedbackQuery>,
) -> ApiResult {
    let mut filter = FeedbackFilter {
        employee_id: None,
        sentiment: None,
        category: query.category.clone(),
        search: query.search.clone(),
    };
    if let Some(raw) = non_empty(&query.employee_id) {
        match Uuid::parse_str(raw) {
            Ok(id) => filter.employee_id = Some(id),
            Err(_) => return ok("feedback", Vec::<()>::new()),
        }
    }
    if let Some(raw) = non_empty(&query.sentiment) {
        let sentiment = Sentiment::try_from(raw).map_err(|_| {
            ApiError::bad_request("Invalid sentiment").with_default("feedback", json!([]))
        })?;
        filter.sentiment = Some(sentiment);
    }

    // Employees only ever see feedback about themselves.
    if session.role() == UserRole::Employee {
        match resolve_employee(state.store.as_ref(), &session).await {
            Some(me) if filter.employee_id.map_or(true, |id| id == me.id) => {
                filter.employee_id = Some(me.id)
            }
            _ => return ok("feedback", Vec::<()>::new()),
        }
    }

    let entries = state
        .store
        .get_feedback(&filter)
        .await
        .map_err(|e| ApiError::from(e).with_default("feedback", json!([])))?;
    ok("feedback", entries)
}

async fn create_feedback(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<FeedbackPayload>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload.map_err(|e| {
        tracing::warn!("Rejected feedback body: {}", e);
        ApiError::bad_request(MISSING_FIELDS)
    })?;

    let (Some(employee_id), Some(category), Some(sentiment), Some(text), Some(author_id)) = (
        non_empty(&payload.employee_id),
        non_empty(&payload.category),
        non_empty(&payload.sentiment),
        non_empty(&payload.feedback),
        non_empty(&payload.author_id),
    ) else {
        return Err(ApiError::bad_request(MISSING_FIELDS));
    };

    // Unparseable references cannot name an existing record.
    let (Ok(employee_id), Ok(author_id), Ok(sentiment)) = (
        Uuid::parse_str(employee_id),
        Uuid::parse_str(author_id),
        Sentiment::try_from(sentiment),
    ) else {
        tracing::warn!("Feedback submission with unparseable fields from {}", session.user.email);
        return Err(ApiError::internal(CREATE_FAILED));
    };

    let created = state
        .store
        .create_feedback(NewFeedback {
            feedback: text.to_string(),
            sentiment,
            category: category.to_string(),
            employee_id,
            author_id,
        })
        .await
        .map_err(|e| {
            tracing::error!("Failed to create feedback: {}", e);
            ApiError::internal(CREATE_FAILED)
        })?;

    let notice = NewNotification {
        title: "Feedback Submitted".into(),
        message: format!("Your feedback for {} has been recorded.", created.employee.name),
        kind: NotificationType::Success,
        user_id: author_id,
        action_url: None,
    };
    if let Err(e) = state.notifications.add(state.store.as_ref(), notice).await {
        tracing::warn!("Failed to notify author {}: {}", author_id, e);
    }
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "feedback",
        &format!("submitted feedback for {}", created.employee.name),
        Some(json!({ "feedbackId": created.feedback.id, "employeeId": employee_id })),
    )
    .await;

    ok("feedback", created)
}

async fn delete_feedback(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> ApiResult {
    require_api_role(&session, &[UserRole::Hr, UserRole::Lead])?;
    state.store.delete_feedback(id).await?;
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "delete",
        "deleted a feedback entry",
        Some(json!({ "feedbackId": id })),
    )
    .await;
    ok_empty()
}
