use uuid::Uuid;

/// Failure of a single data-access operation.
///
/// Every storage call returns this instead of panicking; the HTTP layer turns
/// it into a `{success: false, error}` body.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl DataError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        DataError::NotFound { entity, id }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        DataError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DataError::Conflict(msg.into())
    }
}

pub type DataResult<T> = Result<T, DataError>;
