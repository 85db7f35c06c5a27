use crate::error::DataError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

/// Failure body for every `/api` and `/auth` route: `{success: false, error}`,
/// optionally with an empty payload under the key the caller expects.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    fallback: Option<(&'static str, Value)>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            fallback: None,
        }
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden")
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    /// Adds `key: value` to the failure body, e.g. `feedback: []` for list routes.
    pub fn with_default(mut self, key: &'static str, value: Value) -> Self {
        self.fallback = Some((key, value));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DataError> for ApiError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound { .. } => ApiError::not_found(err.to_string()),
            DataError::Validation(msg) => ApiError::bad_request(msg),
            DataError::Conflict(msg) => ApiError::new(StatusCode::CONFLICT, msg),
            DataError::Storage(e) => {
                tracing::error!("Storage failure: {}", e);
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("error".into(), Value::String(self.message));
        if let Some((key, value)) = self.fallback {
            body.insert(key.into(), value);
        }
        (self.status, Json(Value::Object(body))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn data_errors_map_to_statuses() {
        let id = Uuid::new_v4();
        assert_eq!(ApiError::from(DataError::not_found("Employee", id)).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(DataError::validation("bad")).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(DataError::conflict("dup")).status(), StatusCode::CONFLICT);

        let storage = ApiError::from(DataError::Storage(sqlx::Error::PoolTimedOut));
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.message(), "Internal server error");
    }
}
