use super::{clamp_limit, prune_cutoff, validate_score, Store, EMPLOYEE_RECENT_FEEDBACK};
use crate::domain::models::{
    non_empty, ActivityLog, ActivityLogEntry, AuthorSummary, CreatedFeedback, CreatedReport, Employee,
    EmployeeFilter, EmployeeSummary, EmployeeUpdate, EmployeeWithFeedback, Feedback,
    FeedbackEntry, FeedbackFilter, NewActivityLog, NewEmployee, NewFeedback, NewNotification,
    NewReport, NewUser, Notification, Report, ReportEntry, ReportFilter, Sentiment, User,
    UserRole, UserSummary,
};
use crate::error::{DataError, DataResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, name, role, employee_id, created_at";
const EMPLOYEE_COLUMNS: &str =
    "id, name, email, department, position, satisfaction_score, join_date, created_at";
const FEEDBACK_COLUMNS: &str =
    "id, feedback, sentiment, category, employee_id, author_id, created_at";
const NOTIFICATION_COLUMNS: &str =
    "id, title, message, notification_type, read, action_url, user_id, created_at";

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_user(&self, id: Uuid) -> DataResult<User> {
        self.get_user_by_id(id)
            .await?
            .ok_or_else(|| DataError::not_found("User", id))
    }
}

/// Logs a failed statement and classifies the driver error.
fn storage_error(op: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some("23505") => {
                    tracing::warn!("Failed to {}: unique violation ({:?})", op, db_err.constraint());
                    let msg = match db_err.constraint() {
                        Some(c) if c.contains("email") => "A record with this email already exists",
                        _ => "Duplicate value",
                    };
                    return DataError::conflict(msg);
                }
                Some("23503") => {
                    tracing::warn!("Failed to {}: foreign key violation ({:?})", op, db_err.constraint());
                    return DataError::validation("Referenced record does not exist");
                }
                Some("23514") => {
                    tracing::warn!("Failed to {}: check violation ({:?})", op, db_err.constraint());
                    return DataError::validation("Value out of range");
                }
                _ => {}
            }
        }
        tracing::error!("Failed to {}: {}", op, err);
        DataError::Storage(err)
    }
}

/// Builds an `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[derive(FromRow)]
struct FeedbackEntryRow {
    id: Uuid,
    feedback: String,
    sentiment: Sentiment,
    category: String,
    employee_id: Uuid,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    employee_name: String,
    employee_email: String,
    employee_department: String,
    author_name: String,
    author_email: String,
}

impl From<FeedbackEntryRow> for FeedbackEntry {
    fn from(row: FeedbackEntryRow) -> Self {
        FeedbackEntry {
            employee: EmployeeSummary {
                id: row.employee_id,
                name: row.employee_name,
                email: row.employee_email,
                department: row.employee_department,
            },
            author: AuthorSummary {
                name: row.author_name,
                email: row.author_email,
            },
            feedback: Feedback {
                id: row.id,
                feedback: row.feedback,
                sentiment: row.sentiment,
                category: row.category,
                employee_id: row.employee_id,
                author_id: row.author_id,
                created_at: row.created_at,
            },
        }
    }
}

#[derive(FromRow)]
struct ActivityLogRow {
    id: Uuid,
    action: String,
    description: String,
    user_id: Uuid,
    user_name: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    account_name: String,
    account_email: String,
    account_role: UserRole,
}

impl From<ActivityLogRow> for ActivityLogEntry {
    fn from(row: ActivityLogRow) -> Self {
        ActivityLogEntry {
            user: UserSummary {
                name: row.account_name,
                email: row.account_email,
                role: row.account_role,
            },
            log: ActivityLog {
                id: row.id,
                action: row.action,
                description: row.description,
                user_id: row.user_id,
                user_name: row.user_name,
                metadata: row.metadata,
                created_at: row.created_at,
            },
        }
    }
}

#[derive(FromRow)]
struct ReportRow {
    id: Uuid,
    title: String,
    report_type: String,
    data: serde_json::Value,
    created_by_id: Uuid,
    created_at: DateTime<Utc>,
    creator_name: String,
    creator_email: String,
    creator_role: UserRole,
}

impl From<ReportRow> for ReportEntry {
    fn from(row: ReportRow) -> Self {
        ReportEntry {
            created_by: UserSummary {
                name: row.creator_name,
                email: row.creator_email,
                role: row.creator_role,
            },
            report: Report {
                id: row.id,
                title: row.title,
                kind: row.report_type,
                data: row.data,
                created_by_id: row.created_by_id,
                created_at: row.created_at,
            },
        }
    }
}

const REPORT_SELECT: &str = r#"
    SELECT r.id, r.title, r.report_type, r.data, r.created_by_id, r.created_at,
           u.name AS creator_name, u.email AS creator_email, u.role AS creator_role
    FROM reports r
    JOIN users u ON u.id = r.created_by_id
"#;

#[async_trait]
impl Store for PgStore {
    // ========== Users ==========

    async fn get_user_by_email(&self, email: &str) -> DataResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("fetch user"))
    }

    async fn get_user_by_id(&self, id: Uuid) -> DataResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error("fetch user"))
    }

    async fn create_user(&self, new: NewUser) -> DataResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.name)
        .bind(new.role)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create user"))
    }

    async fn get_or_create_user(&self, new: NewUser) -> DataResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, role, employee_id)
            VALUES ($1, $2, $3, $4, (SELECT id FROM employees WHERE email = $2))
            ON CONFLICT (email) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.email)
        .bind(&new.name)
        .bind(new.role)
        .execute(&self.pool)
        .await
        .map_err(storage_error("get or create user"))?;

        self.get_user_by_email(&new.email).await?.ok_or_else(|| {
            tracing::error!("User {} missing right after upsert", new.email);
            DataError::validation("Failed to get or create user")
        })
    }

    async fn link_user_employee(
        &self,
        user_id: Uuid,
        employee_id: Option<Uuid>,
    ) -> DataResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET employee_id = $2 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("link user to employee"))?
        .ok_or_else(|| DataError::not_found("User", user_id))
    }

    // ========== Employees ==========

    async fn create_employee(&self, new: NewEmployee) -> DataResult<Employee> {
        validate_score(new.satisfaction_score)?;
        let employee = sqlx::query_as::<_, Employee>(&format!(
            r#"
            INSERT INTO employees (id, name, email, department, position, satisfaction_score, join_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EMPLOYEE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.department)
        .bind(&new.position)
        .bind(new.satisfaction_score.unwrap_or(0))
        .bind(new.join_date.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create employee"))?;

        sqlx::query("UPDATE users SET employee_id = $1 WHERE email = $2 AND employee_id IS NULL")
            .bind(employee.id)
            .bind(&employee.email)
            .execute(&self.pool)
            .await
            .map_err(storage_error("link employee account"))?;

        Ok(employee)
    }

    async fn get_employee(&self, id: Uuid) -> DataResult<Option<Employee>> {
        sqlx::query_as::<_, Employee>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("fetch employee"))
    }

    async fn get_employees(&self, filter: &EmployeeFilter) -> DataResult<Vec<EmployeeWithFeedback>> {
        let employees = sqlx::query_as::<_, Employee>(&format!(
            r#"
            SELECT {EMPLOYEE_COLUMNS}
            FROM employees
            WHERE ($1::text IS NULL OR department = $1)
              AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2 OR position ILIKE $2)
            ORDER BY name ASC
            "#
        ))
        .bind(non_empty(&filter.department))
        .bind(non_empty(&filter.search).map(contains_pattern))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch employees"))?;

        if employees.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = employees.iter().map(|e| e.id).collect();
        let recent = sqlx::query_as::<_, Feedback>(&format!(
            r#"
            SELECT {FEEDBACK_COLUMNS}
            FROM (
                SELECT f.*, row_number() OVER (PARTITION BY employee_id ORDER BY created_at DESC) AS rn
                FROM feedback f
                WHERE employee_id = ANY($1)
            ) ranked
            WHERE rn <= $2
            ORDER BY created_at DESC
            "#
        ))
        .bind(&ids[..])
        .bind(EMPLOYEE_RECENT_FEEDBACK as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch employee feedback"))?;

        let mut by_employee: HashMap<Uuid, Vec<Feedback>> = HashMap::new();
        for fb in recent {
            by_employee.entry(fb.employee_id).or_default().push(fb);
        }

        Ok(employees
            .into_iter()
            .map(|employee| EmployeeWithFeedback {
                feedback: by_employee.remove(&employee.id).unwrap_or_default(),
                employee,
            })
            .collect())
    }

    async fn update_employee(&self, id: Uuid, update: EmployeeUpdate) -> DataResult<Employee> {
        validate_score(update.satisfaction_score)?;
        sqlx::query_as::<_, Employee>(&format!(
            r#"
            UPDATE employees SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                department = COALESCE($4, department),
                position = COALESCE($5, position),
                satisfaction_score = COALESCE($6, satisfaction_score)
            WHERE id = $1
            RETURNING {EMPLOYEE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(update.name)
        .bind(update.email)
        .bind(update.department)
        .bind(update.position)
        .bind(update.satisfaction_score)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("update employee"))?
        .ok_or_else(|| DataError::not_found("Employee", id))
    }

    async fn delete_employee(&self, id: Uuid) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM employees WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| match storage_error("delete employee")(err) {
                DataError::Validation(_) => {
                    DataError::conflict("Employee has feedback and cannot be deleted")
                }
                other => other,
            })?;
        if result.rows_affected() == 0 {
            return Err(DataError::not_found("Employee", id));
        }
        Ok(())
    }

    // ========== Feedback ==========

    async fn create_feedback(&self, new: NewFeedback) -> DataResult<CreatedFeedback> {
        let feedback = sqlx::query_as::<_, Feedback>(&format!(
            r#"
            INSERT INTO feedback (id, feedback, sentiment, category, employee_id, author_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {FEEDBACK_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.feedback)
        .bind(new.sentiment)
        .bind(&new.category)
        .bind(new.employee_id)
        .bind(new.author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create feedback"))?;

        let employee = self
            .get_employee(feedback.employee_id)
            .await?
            .ok_or_else(|| DataError::not_found("Employee", feedback.employee_id))?;
        let author = self.find_user(feedback.author_id).await?;

        Ok(CreatedFeedback {
            feedback,
            employee,
            author: AuthorSummary::from(&author),
        })
    }

    async fn get_feedback(&self, filter: &FeedbackFilter) -> DataResult<Vec<FeedbackEntry>> {
        let rows = sqlx::query_as::<_, FeedbackEntryRow>(
            r#"
            SELECT f.id, f.feedback, f.sentiment, f.category, f.employee_id, f.author_id, f.created_at,
                   e.name AS employee_name, e.email AS employee_email, e.department AS employee_department,
                   u.name AS author_name, u.email AS author_email
            FROM feedback f
            JOIN employees e ON e.id = f.employee_id
            JOIN users u ON u.id = f.author_id
            WHERE ($1::uuid IS NULL OR f.employee_id = $1)
              AND ($2::sentiment IS NULL OR f.sentiment = $2)
              AND ($3::text IS NULL OR f.category = $3)
              AND ($4::text IS NULL OR f.feedback ILIKE $4)
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(filter.employee_id)
        .bind(filter.sentiment)
        .bind(non_empty(&filter.category))
        .bind(non_empty(&filter.search).map(contains_pattern))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch feedback"))?;

        Ok(rows.into_iter().map(FeedbackEntry::from).collect())
    }

    async fn delete_feedback(&self, id: Uuid) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM feedback WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete feedback"))?;
        if result.rows_affected() == 0 {
            return Err(DataError::not_found("Feedback", id));
        }
        Ok(())
    }

    // ========== Notifications ==========

    async fn create_notification(&self, new: NewNotification) -> DataResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (id, title, message, notification_type, action_url, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.kind)
        .bind(&new.action_url)
        .bind(new.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create notification"))
    }

    async fn get_notification(&self, id: Uuid) -> DataResult<Option<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("fetch notification"))
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> DataResult<Vec<Notification>> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(user_id)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch notifications"))
    }

    async fn mark_notification_read(&self, id: Uuid) -> DataResult<()> {
        let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("update notification"))?;
        if result.rows_affected() == 0 {
            return Err(DataError::not_found("Notification", id));
        }
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> DataResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND read = FALSE")
                .bind(user_id)
                .execute(&self.pool)
                .await
                .map_err(storage_error("update notifications"))?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete notification"))?;
        if result.rows_affected() == 0 {
            return Err(DataError::not_found("Notification", id));
        }
        Ok(())
    }

    async fn clear_notifications(&self, user_id: Uuid) -> DataResult<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("clear notifications"))?;
        Ok(result.rows_affected())
    }

    async fn unread_notification_count(&self, user_id: Uuid) -> DataResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("count unread notifications"))
    }

    // ========== Activity logs ==========

    async fn create_activity_log(&self, new: NewActivityLog) -> DataResult<ActivityLog> {
        sqlx::query_as::<_, ActivityLog>(
            r#"
            INSERT INTO activity_logs (id, action, description, user_id, user_name, metadata)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, action, description, user_id, user_name, metadata, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.action)
        .bind(&new.description)
        .bind(new.user_id)
        .bind(&new.user_name)
        .bind(new.metadata.unwrap_or_else(|| serde_json::json!({})))
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create activity log"))
    }

    async fn get_activity_logs(&self, limit: i64) -> DataResult<Vec<ActivityLogEntry>> {
        let rows = sqlx::query_as::<_, ActivityLogRow>(
            r#"
            SELECT a.id, a.action, a.description, a.user_id, a.user_name, a.metadata, a.created_at,
                   u.name AS account_name, u.email AS account_email, u.role AS account_role
            FROM activity_logs a
            JOIN users u ON u.id = a.user_id
            ORDER BY a.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch activity logs"))?;
        Ok(rows.into_iter().map(ActivityLogEntry::from).collect())
    }

    async fn get_user_activity_logs(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> DataResult<Vec<ActivityLog>> {
        sqlx::query_as::<_, ActivityLog>(
            r#"
            SELECT id, action, description, user_id, user_name, metadata, created_at
            FROM activity_logs
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(clamp_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch user activity logs"))
    }

    async fn prune_activity_logs(&self, days_to_keep: i64) -> DataResult<u64> {
        let Some(cutoff) = prune_cutoff(Utc::now(), days_to_keep) else {
            return Ok(0);
        };
        let result = sqlx::query("DELETE FROM activity_logs WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(storage_error("clear old activity logs"))?;
        Ok(result.rows_affected())
    }

    // ========== Reports ==========

    async fn create_report(&self, new: NewReport) -> DataResult<CreatedReport> {
        let report = sqlx::query_as::<_, Report>(
            r#"
            INSERT INTO reports (id, title, report_type, data, created_by_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, report_type, data, created_by_id, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.kind)
        .bind(&new.data)
        .bind(new.created_by_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("create report"))?;

        let creator = self.find_user(report.created_by_id).await?;
        Ok(CreatedReport {
            created_by: AuthorSummary::from(&creator),
            report,
        })
    }

    async fn get_reports(&self, filter: &ReportFilter) -> DataResult<Vec<ReportEntry>> {
        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            {REPORT_SELECT}
            WHERE ($1::text IS NULL OR r.report_type = $1)
              AND ($2::uuid IS NULL OR r.created_by_id = $2)
            ORDER BY r.created_at DESC
            "#
        ))
        .bind(non_empty(&filter.kind))
        .bind(filter.created_by_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("fetch reports"))?;
        Ok(rows.into_iter().map(ReportEntry::from).collect())
    }

    async fn delete_report(&self, id: Uuid) -> DataResult<()> {
        let result = sqlx::query("DELETE FROM reports WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete report"))?;
        if result.rows_affected() == 0 {
            return Err(DataError::not_found("Report", id));
        }
        Ok(())
    }
}
