use crate::db::Store;
use crate::domain::models::NewActivityLog;
use serde_json::Value;
use uuid::Uuid;

/// Appends an activity log entry. Failures are logged and swallowed so that
/// auditing never fails the action being audited.
pub async fn log_activity(
    store: &dyn Store,
    user_id: Uuid,
    user_name: &str,
    action: &str,
    description: &str,
    metadata: Option<Value>,
) {
    let entry = NewActivityLog {
        action: action.to_string(),
        description: description.to_string(),
        user_id,
        user_name: user_name.to_string(),
        metadata,
    };
    if let Err(e) = store.create_activity_log(entry).await {
        tracing::warn!("Failed to log activity '{}' for {}: {}", action, user_id, e);
    }
}
