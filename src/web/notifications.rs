use crate::db::DEFAULT_NOTIFICATION_LIMIT;
use crate::domain::models::{NewNotification, NotificationType};
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_hr;
use crate::web::session::CurrentSession;
use crate::web::{ok, ok_empty, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: NotificationType,
    pub action_url: Option<String>,
    /// Recipient; defaults to the caller. Only HR may address someone else.
    pub user_id: Option<Uuid>,
}

fn default_kind() -> NotificationType {
    NotificationType::Info
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/",
            get(list_notifications)
                .post(create_notification)
                .delete(clear_notifications),
        )
        .route("/unread-count", get(unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/:id/read", post(mark_read))
        .route("/:id", delete(delete_notification))
        .with_state(state)
}

async fn list_notifications(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Query(query): Query<LimitQuery>,
) -> ApiResult {
    let user_id = session.user.id;
    let notifications = match query.limit {
        Some(limit) if limit != DEFAULT_NOTIFICATION_LIMIT => {
            state.store.get_user_notifications(user_id, limit).await
        }
        _ => state
            .notifications
            .get(state.store.as_ref(), user_id)
            .await
            .map(|snapshot| snapshot.notifications),
    }
    .map_err(|e| ApiError::from(e).with_default("notifications", json!([])))?;
    ok("notifications", notifications)
}

async fn unread_count(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult {
    let snapshot = state
        .notifications
        .get(state.store.as_ref(), session.user.id)
        .await
        .map_err(|e| ApiError::from(e).with_default("count", json!(0)))?;
    ok("count", snapshot.unread_count)
}

async fn create_notification(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<NotificationPayload>, JsonRejection>,
) -> ApiResult {
    let Json(payload) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let user_id = payload.user_id.unwrap_or(session.user.id);
    if user_id != session.user.id {
        require_hr(&session)?;
    }
    if payload.title.trim().is_empty() || payload.message.trim().is_empty() {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let created = state
        .notifications
        .add(
            state.store.as_ref(),
            NewNotification {
                title: payload.title,
                message: payload.message,
                kind: payload.kind,
                user_id,
                action_url: payload.action_url,
            },
        )
        .await?;
    ok("notification", created)
}

async fn mark_read(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> ApiResult {
    state
        .notifications
        .mark_read(state.store.as_ref(), session.user.id, id)
        .await?;
    ok_empty()
}

async fn mark_all_read(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult {
    let updated = state
        .notifications
        .mark_all_read(state.store.as_ref(), session.user.id)
        .await?;
    ok("updated", updated)
}

async fn delete_notification(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> ApiResult {
    state
        .notifications
        .delete(state.store.as_ref(), session.user.id, id)
        .await?;
    ok_empty()
}

async fn clear_notifications(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
) -> ApiResult {
    let removed = state
        .notifications
        .clear(state.store.as_ref(), session.user.id)
        .await?;
    ok("deleted", removed)
}

#[cfg(test)]
mod tests {
    use crate::web::test_support::{body_json, json_request, request, TestApp};
    use axum::http::StatusCode;
    use serde_json::json;

    async fn unread(app: &TestApp, cookie: &str) -> i64 {
        let response = app
            .call(request("GET", "/api/notifications/unread-count", Some(cookie)))
            .await;
        body_json(response).await["count"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn read_all_zeroes_the_badge_and_repeats_as_no_op() {
        let app = TestApp::seeded().await;
        let cookie = app.cookie_for("hr@pulsecheck.dev").await;
        assert_eq!(unread(&app, &cookie).await, 2);

        for expected in [2, 0] {
            let response = app
                .call(request("POST", "/api/notifications/read-all", Some(&cookie)))
                .await;
            assert_eq!(body_json(response).await["updated"], expected);
            assert_eq!(unread(&app, &cookie).await, 0);
        }
    }

    #[tokio::test]
    async fn create_list_read_and_delete() {
        let app = TestApp::seeded().await;
        let cookie = app.cookie_for("lead@pulsecheck.dev").await;

        let response = app
            .call(json_request(
                "POST",
                "/api/notifications",
                Some(&cookie),
                json!({"title": "Reminder", "message": "Review due", "type": "WARNING"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        let id = created["notification"]["id"].as_str().unwrap().to_string();
        assert_eq!(created["notification"]["type"], "WARNING");
        assert_eq!(created["notification"]["read"], false);

        let response = app
            .call(request("GET", "/api/notifications?limit=10", Some(&cookie)))
            .await;
        assert_eq!(body_json(response).await["notifications"].as_array().unwrap().len(), 1);

        let response = app
            .call(request("POST", &format!("/api/notifications/{id}/read"), Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.call(request("GET", "/api/notifications", Some(&cookie))).await;
        assert_eq!(body_json(response).await["notifications"][0]["read"], true);

        let response = app
            .call(request("DELETE", &format!("/api/notifications/{id}"), Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = app.call(request("GET", "/api/notifications", Some(&cookie))).await;
        assert!(body_json(response).await["notifications"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_users_notifications_are_not_found() {
        let app = TestApp::seeded().await;
        let hr = app.user("hr@pulsecheck.dev").await;
        let hr_notifications = app.state.store.get_user_notifications(hr.id, 10).await.unwrap();
        let id = hr_notifications[0].id;

        let cookie = app.cookie_for("lead@pulsecheck.dev").await;
        let response = app
            .call(request("POST", &format!("/api/notifications/{id}/read"), Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_hr_can_notify_someone_else() {
        let app = TestApp::seeded().await;
        let john = app.user("john.doe@company.com").await;
        let body = json!({"title": "Hi", "message": "Welcome", "userId": john.id});

        let lead_cookie = app.cookie_for("lead@pulsecheck.dev").await;
        let response = app
            .call(json_request("POST", "/api/notifications", Some(&lead_cookie), body.clone()))
            .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let hr_cookie = app.cookie_for("hr@pulsecheck.dev").await;
        let response = app
            .call(json_request("POST", "/api/notifications", Some(&hr_cookie), body))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(app.state.store.unread_notification_count(john.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let app = TestApp::seeded().await;
        let cookie = app.cookie_for("hr@pulsecheck.dev").await;
        let response = app.call(request("DELETE", "/api/notifications", Some(&cookie))).await;
        assert_eq!(body_json(response).await["deleted"], 2);
        let response = app.call(request("GET", "/api/notifications", Some(&cookie))).await;
        assert!(body_json(response).await["notifications"].as_array().unwrap().is_empty());
    }
}
