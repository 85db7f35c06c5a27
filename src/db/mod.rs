pub mod memory;
pub mod postgres;
pub mod seed;

use crate::domain::models::{
    ActivityLog, ActivityLogEntry, CreatedFeedback, CreatedReport, Employee, EmployeeFilter, EmployeeUpdate,
    EmployeeWithFeedback, FeedbackEntry, FeedbackFilter, NewActivityLog, NewEmployee, NewFeedback,
    NewNotification, NewReport, NewUser, Notification, ReportEntry, ReportFilter, User,
};
use crate::error::{DataError, DataResult};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;
pub const DEFAULT_ACTIVITY_LIMIT: i64 = 100;
pub const DEFAULT_USER_ACTIVITY_LIMIT: i64 = 50;
pub const DEFAULT_ACTIVITY_RETENTION_DAYS: i64 = 90;
pub const MAX_ACTIVITY_RETENTION_DAYS: i64 = 36_500;
/// Number of recent feedback entries attached to each employee in listings.
pub const EMPLOYEE_RECENT_FEEDBACK: usize = 5;

/// Data-access layer. One method per storage operation; every method is a
/// single independent statement and reports failures as [`DataError`].
#[async_trait]
pub trait Store: Send + Sync {
    // ========== Users ==========

    async fn get_user_by_email(&self, email: &str) -> DataResult<Option<User>>;

    async fn get_user_by_id(&self, id: Uuid) -> DataResult<Option<User>>;

    async fn create_user(&self, new: NewUser) -> DataResult<User>;

    /// Returns the user with `new.email`, creating it if absent. An existing
    /// row is never modified. A newly created user is linked to the employee
    /// record sharing its email, if there is one.
    async fn get_or_create_user(&self, new: NewUser) -> DataResult<User>;

    async fn link_user_employee(&self, user_id: Uuid, employee_id: Option<Uuid>)
        -> DataResult<User>;

    // ========== Employees ==========

    async fn create_employee(&self, new: NewEmployee) -> DataResult<Employee>;

    async fn get_employee(&self, id: Uuid) -> DataResult<Option<Employee>>;

    async fn get_employees(&self, filter: &EmployeeFilter) -> DataResult<Vec<EmployeeWithFeedback>>;

    async fn update_employee(&self, id: Uuid, update: EmployeeUpdate) -> DataResult<Employee>;

    /// Rejects with [`DataError::Conflict`] while feedback references the employee.
    async fn delete_employee(&self, id: Uuid) -> DataResult<()>;

    // ========== Feedback ==========

    async fn create_feedback(&self, new: NewFeedback) -> DataResult<CreatedFeedback>;

    async fn get_feedback(&self, filter: &FeedbackFilter) -> DataResult<Vec<FeedbackEntry>>;

    async fn delete_feedback(&self, id: Uuid) -> DataResult<()>;

    // ========== Notifications ==========

    async fn create_notification(&self, new: NewNotification) -> DataResult<Notification>;

    async fn get_notification(&self, id: Uuid) -> DataResult<Option<Notification>>;

    async fn get_user_notifications(&self, user_id: Uuid, limit: i64)
        -> DataResult<Vec<Notification>>;

    async fn mark_notification_read(&self, id: Uuid) -> DataResult<()>;

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> DataResult<u64>;

    async fn delete_notification(&self, id: Uuid) -> DataResult<()>;

    async fn clear_notifications(&self, user_id: Uuid) -> DataResult<u64>;

    async fn unread_notification_count(&self, user_id: Uuid) -> DataResult<i64>;

    // ========== Activity logs ==========

    async fn create_activity_log(&self, new: NewActivityLog) -> DataResult<ActivityLog>;

    async fn get_activity_logs(&self, limit: i64) -> DataResult<Vec<ActivityLogEntry>>;

    async fn get_user_activity_logs(&self, user_id: Uuid, limit: i64)
        -> DataResult<Vec<ActivityLog>>;

    /// Deletes logs older than `days_to_keep` days and returns how many were removed.
    async fn prune_activity_logs(&self, days_to_keep: i64) -> DataResult<u64>;

    // ========== Reports ==========

    async fn create_report(&self, new: NewReport) -> DataResult<CreatedReport>;

    async fn get_reports(&self, filter: &ReportFilter) -> DataResult<Vec<ReportEntry>>;

    async fn delete_report(&self, id: Uuid) -> DataResult<()>;
}

pub(crate) fn validate_score(score: Option<i32>) -> DataResult<()> {
    match score {
        Some(s) if !(0..=100).contains(&s) => Err(DataError::validation(
            "Satisfaction score must be between 0 and 100",
        )),
        _ => Ok(()),
    }
}

pub(crate) fn clamp_limit(limit: i64) -> i64 {
    limit.clamp(0, 1000)
}

/// Oldest `created_at` that survives a prune. `None` when the window reaches
/// past the representable range, in which case nothing is old enough to delete.
pub(crate) fn prune_cutoff(now: DateTime<Utc>, days_to_keep: i64) -> Option<DateTime<Utc>> {
    Duration::try_days(days_to_keep.max(0)).and_then(|keep| now.checked_sub_signed(keep))
}
