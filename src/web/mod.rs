pub mod activity;
pub mod ai;
pub mod auth;
pub mod employees;
pub mod error;
pub mod export;
pub mod feedback;
pub mod guard;
pub mod notifications;
pub mod pages;
pub mod reports;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::ApiError;

use crate::state::SharedState;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use serde_json::{json, Map, Value};

pub type ApiResult = Result<Json<Value>, ApiError>;

/// `{success: true, <key>: payload}`
pub fn ok<T: Serialize>(key: &str, payload: T) -> ApiResult {
    let value = serde_json::to_value(payload).map_err(|e| {
        tracing::error!("Failed to encode response: {}", e);
        ApiError::internal("Internal server error")
    })?;
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert(key.into(), value);
    Ok(Json(Value::Object(body)))
}

pub fn ok_empty() -> ApiResult {
    Ok(Json(json!({ "success": true })))
}

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/auth", auth::router(state.clone()))
        .merge(pages::router(state.clone()))
        .nest("/api", api_routes(state))
}

fn api_routes(state: SharedState) -> Router {
    Router::new()
        .nest("/feedback", feedback::router(state.clone()))
        .nest("/employees", employees::router(state.clone()))
        .nest("/notifications", notifications::router(state.clone()))
        .nest("/activity", activity::router(state.clone()))
        .nest("/reports", reports::router(state.clone()))
        .nest("/ai", ai::router(state.clone()))
        .nest("/export", export::router(state))
}
