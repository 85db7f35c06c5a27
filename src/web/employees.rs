use crate::domain::models::{EmployeeFilter, EmployeeUpdate, NewEmployee};
use crate::services::activity::log_activity;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::guard::require_hr;
use crate::web::session::CurrentSession;
use crate::web::{ok, ok_empty, ApiResult};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(list_employees).post(create_employee))
        .route("/:id", patch(update_employee).delete(delete_employee))
        .with_state(state)
}

async fn list_employees(
    State(state): State<SharedState>,
    CurrentSession(_session): CurrentSession,
    Query(filter): Query<EmployeeFilter>,
) -> ApiResult {
    let employees = state
        .store
        .get_employees(&filter)
        .await
        .map_err(|e| ApiError::from(e).with_default("employees", json!([])))?;
    ok("employees", employees)
}

async fn create_employee(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> ApiResult {
    require_hr(&session)?;
    let Json(new) = payload.map_err(|_| ApiError::bad_request("Missing required fields"))?;
    if [&new.name, &new.email, &new.department, &new.position]
        .iter()
        .any(|v| v.trim().is_empty())
    {
        return Err(ApiError::bad_request("Missing required fields"));
    }

    let employee = state.store.create_employee(new).await?;
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "create",
        "added a new employee",
        Some(json!({ "employeeId": employee.id })),
    )
    .await;
    ok("employee", employee)
}

async fn update_employee(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
    payload: Result<Json<EmployeeUpdate>, JsonRejection>,
) -> ApiResult {
    require_hr(&session)?;
    let Json(update) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let employee = state.store.update_employee(id, update).await?;
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "update",
        &format!("updated employee {}", employee.name),
        Some(json!({ "employeeId": employee.id })),
    )
    .await;
    ok("employee", employee)
}

async fn delete_employee(
    State(state): State<SharedState>,
    CurrentSession(session): CurrentSession,
    Path(id): Path<Uuid>,
) -> ApiResult {
    require_hr(&session)?;
    state.store.delete_employee(id).await?;
    log_activity(
        state.store.as_ref(),
        session.user.id,
        &session.user.name,
        "delete",
        "removed an employee",
        Some(json!({ "employeeId": id })),
    )
    .await;
    ok_empty()
}
