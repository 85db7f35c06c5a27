use crate::db::{
    DEFAULT_ACTIVITY_LIMIT, DEFAULT_ACTIVITY_RETENTION_DAYS, DEFAULT_USER_ACTIVITY_LIMIT,
    MAX_ACTIVITY_RETENTION_DAYS,
};
use crate::services::activity::log_activity;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_hr;
use crate::web::notifications::LimitQuery;
use crate::web::session::CurrentSession;
use crate::web::{ok, ApiResult};
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PruneRequest {
    pub days_to_keep: Option<i64>,
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(recent_activity))
        .route("/me", get(my_activity))
        .route("/prune", post(prune_activity))
        .with_state(state)
}

/// Organisation-wide feed, newest first, joined with each actor's summary.
async fn recent_activity(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    require_hr(&session)?;
    let logs = state
        .store
        .get_activity_logs(query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT))
        .await
        .map_err(|e| ApiError::from(e).with_default("logs", json!([])))?;
    ok("logs", logs)
}

async fn my_activity(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let logs = state
        .store
        .get_user_activity_logs(
            session.user.id,
            query.limit.unwrap_or(DEFAULT_USER_ACTIVITY_LIMIT),
        )
        .await
        .map_err(|e| ApiError::from(e).with_default("logs", json!([])))?;
    ok("logs", logs)
}

async fn prune_activity(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    body: Option<Json<PruneRequest>>,
) -> ApiResult {
    require_hr(&session)?;
    let days = body
        .and_then(|Json(b)| b.days_to_keep)
        .unwrap_or(DEFAULT_ACTIVITY_RETENTION_DAYS);
    if !(0..=MAX_ACTIVITY_RETENTION_DAYS).contains(&days) {
        return Err(ApiError::bad_request(format!(
            "daysToKeep must be between 0 and {MAX_ACTIVITY_RETENTION_DAYS}"
        )));
    }

    let deleted = state.store.prune_activity_logs(days).await?;
    tracing::info!("Pruned {} activity logs older than {} days", deleted, days);
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "delete",
        &format!("cleaned up {deleted} old activity logs"),
        Some(json!({ "daysToKeep": days, "deleted": deleted })),
    )
    .await;
    ok("deleted", deleted)
}
