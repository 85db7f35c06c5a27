use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    Hr,
    Lead,
    Employee,
}

impl UserRole {
    /// Lower-cased name carried in the session cookie and compared by route guards.
    pub fn session_name(&self) -> &'static str {
        match self {
            UserRole::Hr => "hr",
            UserRole::Lead => "lead",
            UserRole::Employee => "employee",
        }
    }

    pub fn from_session_name(raw: &str) -> Option<Self> {
        match raw {
            "hr" => Some(UserRole::Hr),
            "lead" => Some(UserRole::Lead),
            "employee" => Some(UserRole::Employee),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "sentiment", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl TryFrom<&str> for Sentiment {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_uppercase().as_str() {
            "POSITIVE" => Ok(Sentiment::Positive),
            "NEGATIVE" => Ok(Sentiment::Negative),
            "NEUTRAL" => Ok(Sentiment::Neutral),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "notification_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub employee_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub position: String,
    pub satisfaction_score: i32,
    pub join_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: Uuid,
    pub feedback: String,
    pub sentiment: Sentiment,
    pub category: String,
    pub employee_id: Uuid,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "notification_type")]
    pub kind: NotificationType,
    pub read: bool,
    pub action_url: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: Uuid,
    pub action: String,
    pub description: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "report_type")]
    pub kind: String,
    pub data: serde_json::Value,
    pub created_by_id: Uuid,
    pub created_at: DateTime<Utc>,
}

// Reduced projections used when joining rows for display.

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AuthorSummary {
    pub name: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserSummary {
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<&Employee> for EmployeeSummary {
    fn from(employee: &Employee) -> Self {
        Self {
            id: employee.id,
            name: employee.name.clone(),
            email: employee.email.clone(),
            department: employee.department.clone(),
        }
    }
}

/// An employee with up to five of their most recent feedback entries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EmployeeWithFeedback {
    #[serde(flatten)]
    pub employee: Employee,
    pub feedback: Vec<Feedback>,
}

/// Result of creating feedback: the full employee row plus the author's name and email.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CreatedFeedback {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub employee: Employee,
    pub author: AuthorSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEntry {
    #[serde(flatten)]
    pub feedback: Feedback,
    pub employee: EmployeeSummary,
    pub author: AuthorSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActivityLogEntry {
    #[serde(flatten)]
    pub log: ActivityLog,
    pub user: UserSummary,
}

/// Result of creating a report: the creator is reduced to name and email.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreatedReport {
    #[serde(flatten)]
    pub report: Report,
    pub created_by: AuthorSummary,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    #[serde(flatten)]
    pub report: Report,
    pub created_by: UserSummary,
}

// Write inputs and query filters.

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: UserRole,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmployee {
    pub name: String,
    pub email: String,
    pub department: String,
    pub position: String,
    pub satisfaction_score: Option<i32>,
    pub join_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub satisfaction_score: Option<i32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EmployeeFilter {
    pub department: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewFeedback {
    pub feedback: String,
    pub sentiment: Sentiment,
    pub category: String,
    pub employee_id: Uuid,
    pub author_id: Uuid,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackFilter {
    pub employee_id: Option<Uuid>,
    pub sentiment: Option<Sentiment>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub user_id: Uuid,
    pub action_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct NewActivityLog {
    pub action: String,
    pub description: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Clone, Debug)]
pub struct NewReport {
    pub title: String,
    pub kind: String,
    pub data: serde_json::Value,
    pub created_by_id: Uuid,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub created_by_id: Option<Uuid>,
}

/// Treats empty and whitespace-only filter values as absent.
pub fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
