use super::{clamp_limit, prune_cutoff, validate_score, Store, EMPLOYEE_RECENT_FEEDBACK};
use crate::domain::models::{
    non_empty, ActivityLog, ActivityLogEntry, AuthorSummary, CreatedFeedback, CreatedReport, Employee,
    EmployeeFilter, EmployeeSummary, EmployeeUpdate, EmployeeWithFeedback, Feedback,
    FeedbackEntry, FeedbackFilter, NewActivityLog, NewEmployee, NewFeedback, NewNotification,
    NewReport, NewUser, Notification, Report, ReportEntry, ReportFilter, User, UserSummary,
};
use crate::error::{DataError, DataResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    employees: Vec<Employee>,
    feedback: Vec<Feedback>,
    notifications: Vec<Notification>,
    activity_logs: Vec<ActivityLog>,
    reports: Vec<Report>,
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn employee(&self, id: Uuid) -> Option<&Employee> {
        self.employees.iter().find(|e| e.id == id)
    }

    fn report_entry(&self, report: &Report) -> Option<ReportEntry> {
        let creator = self.user(report.created_by_id)?;
        Some(ReportEntry {
            report: report.clone(),
            created_by: UserSummary::from(creator),
        })
    }
}

/// In-process [`Store`] used in demo mode (no `DATABASE_URL`) and in tests.
///
/// Mirrors the Postgres schema constraints: unique emails per table, foreign
/// keys checked on insert, and feedback blocking employee deletion.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn backdate_activity_log(&self, id: Uuid, created_at: DateTime<Utc>) {
        let mut t = self.tables.write().await;
        if let Some(log) = t.activity_logs.iter_mut().find(|l| l.id == id) {
            log.created_at = created_at;
        }
    }
}

/// Clones `items` ordered by `created_at` descending; ties keep the latest insert first.
fn newest_first<'a, T, I, F>(items: I, created_at: F) -> Vec<T>
where
    T: Clone + 'a,
    I: DoubleEndedIterator<Item = &'a T>,
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut out: Vec<T> = items.rev().cloned().collect();
    out.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    out
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn email_taken() -> DataError {
    DataError::conflict("A record with this email already exists")
}

#[async_trait]
impl Store for MemoryStore {
    // ========== Users ==========

    async fn get_user_by_email(&self, email: &str) -> DataResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn get_user_by_id(&self, id: Uuid) -> DataResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.user(id).cloned())
    }

    async fn create_user(&self, new: NewUser) -> DataResult<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(email_taken());
        }
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            role: new.role,
            employee_id: None,
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn get_or_create_user(&self, new: NewUser) -> DataResult<User> {
        let mut t = self.tables.write().await;
        if let Some(existing) = t.users.iter().find(|u| u.email == new.email) {
            return Ok(existing.clone());
        }
        let employee_id = t
            .employees
            .iter()
            .find(|e| e.email == new.email)
            .map(|e| e.id);
        let user = User {
            id: Uuid::new_v4(),
            email: new.email,
            name: new.name,
            role: new.role,
            employee_id,
            created_at: Utc::now(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn link_user_employee(
        &self,
        user_id: Uuid,
        employee_id: Option<Uuid>,
    ) -> DataResult<User> {
        let mut t = self.tables.write().await;
        if let Some(eid) = employee_id {
            if t.employee(eid).is_none() {
                return Err(DataError::validation("Referenced record does not exist"));
            }
        }
        let user = t
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| DataError::not_found("User", user_id))?;
        user.employee_id = employee_id;
        Ok(user.clone())
    }

    // ========== Employees ==========

    async fn create_employee(&self, new: NewEmployee) -> DataResult<Employee> {
        validate_score(new.satisfaction_score)?;
        let mut t = self.tables.write().await;
        if t.employees.iter().any(|e| e.email == new.email) {
            return Err(email_taken());
        }
        let now = Utc::now();
        let employee = Employee {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            department: new.department,
            position: new.position,
            satisfaction_score: new.satisfaction_score.unwrap_or(0),
            join_date: new.join_date.unwrap_or(now),
            created_at: now,
        };
        for user in t
            .users
            .iter_mut()
            .filter(|u| u.email == employee.email && u.employee_id.is_none())
        {
            user.employee_id = Some(employee.id);
        }
        t.employees.push(employee.clone());
        Ok(employee)
    }

    async fn get_employee(&self, id: Uuid) -> DataResult<Option<Employee>> {
        let t = self.tables.read().await;
        Ok(t.employee(id).cloned())
    }

    async fn get_employees(&self, filter: &EmployeeFilter) -> DataResult<Vec<EmployeeWithFeedback>> {
        let t = self.tables.read().await;
        let department = non_empty(&filter.department);
        let search = non_empty(&filter.search);

        let mut employees: Vec<Employee> = t
            .employees
            .iter()
            .filter(|e| department.map_or(true, |d| e.department == d))
            .filter(|e| {
                search.map_or(true, |s| {
                    contains_ci(&e.name, s) || contains_ci(&e.email, s) || contains_ci(&e.position, s)
                })
            })
            .cloned()
            .collect();
        employees.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(employees
            .into_iter()
            .map(|employee| {
                let mut feedback = newest_first(
                    t.feedback.iter().filter(|f| f.employee_id == employee.id),
                    |f| f.created_at,
                );
                feedback.truncate(EMPLOYEE_RECENT_FEEDBACK);
                EmployeeWithFeedback { employee, feedback }
            })
            .collect())
    }

    async fn update_employee(&self, id: Uuid, update: EmployeeUpdate) -> DataResult<Employee> {
        validate_score(update.satisfaction_score)?;
        let mut t = self.tables.write().await;
        if let Some(email) = &update.email {
            if t.employees.iter().any(|e| e.id != id && &e.email == email) {
                return Err(email_taken());
            }
        }
        let employee = t
            .employees
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| DataError::not_found("Employee", id))?;
        if let Some(name) = update.name {
            employee.name = name;
        }
        if let Some(email) = update.email {
            employee.email = email;
        }
        if let Some(department) = update.department {
            employee.department = department;
        }
        if let Some(position) = update.position {
            employee.position = position;
        }
        if let Some(score) = update.satisfaction_score {
            employee.satisfaction_score = score;
        }
        Ok(employee.clone())
    }

    async fn delete_employee(&self, id: Uuid) -> DataResult<()> {
        let mut t = self.tables.write().await;
        if t.employee(id).is_none() {
            return Err(DataError::not_found("Employee", id));
        }
        if t.feedback.iter().any(|f| f.employee_id == id) {
            return Err(DataError::conflict("Employee has feedback and cannot be deleted"));
        }
        t.employees.retain(|e| e.id != id);
        for user in t.users.iter_mut().filter(|u| u.employee_id == Some(id)) {
            user.employee_id = None;
        }
        Ok(())
    }

    // ========== Feedback ==========

    async fn create_feedback(&self, new: NewFeedback) -> DataResult<CreatedFeedback> {
        let mut t = self.tables.write().await;
        let (Some(employee), Some(author)) = (t.employee(new.employee_id), t.user(new.author_id))
        else {
            return Err(DataError::validation("Referenced record does not exist"));
        };
        let employee = employee.clone();
        let author = AuthorSummary::from(author);

        let feedback = Feedback {
            id: Uuid::new_v4(),
            feedback: new.feedback,
            sentiment: new.sentiment,
            category: new.category,
            employee_id: new.employee_id,
            author_id: new.author_id,
            created_at: Utc::now(),
        };
        t.feedback.push(feedback.clone());
        Ok(CreatedFeedback {
            feedback,
            employee,
            author,
        })
    }

    async fn get_feedback(&self, filter: &FeedbackFilter) -> DataResult<Vec<FeedbackEntry>> {
        let t = self.tables.read().await;
        let category = non_empty(&filter.category);
        let search = non_empty(&filter.search);

        let matching = newest_first(
            t.feedback.iter().filter(|f| {
                filter.employee_id.map_or(true, |id| f.employee_id == id)
                    && filter.sentiment.map_or(true, |s| f.sentiment == s)
                    && category.map_or(true, |c| f.category == c)
                    && search.map_or(true, |s| contains_ci(&f.feedback, s))
            }),
            |f| f.created_at,
        );

        Ok(matching
            .into_iter()
            .filter_map(|feedback| {
                let employee = EmployeeSummary::from(t.employee(feedback.employee_id)?);
                let author = AuthorSummary::from(t.user(feedback.author_id)?);
                Some(FeedbackEntry {
                    feedback,
                    employee,
                    author,
                })
            })
            .collect())
    }

    async fn delete_feedback(&self, id: Uuid) -> DataResult<()> {
        let mut t = self.tables.write().await;
        let before = t.feedback.len();
        t.feedback.retain(|f| f.id != id);
        if t.feedback.len() == before {
            return Err(DataError::not_found("Feedback", id));
        }
        Ok(())
    }

    // ========== Notifications ==========

    async fn create_notification(&self, new: NewNotification) -> DataResult<Notification> {
        let mut t = self.tables.write().await;
        if t.user(new.user_id).is_none() {
            return Err(DataError::validation("Referenced record does not exist"));
        }
        let notification = Notification {
            id: Uuid::new_v4(),
            title: new.title,
            message: new.message,
            kind: new.kind,
            read: false,
            action_url: new.action_url,
            user_id: new.user_id,
            created_at: Utc::now(),
        };
        t.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn get_notification(&self, id: Uuid) -> DataResult<Option<Notification>> {
        let t = self.tables.read().await;
        Ok(t.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn get_user_notifications(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> DataResult<Vec<Notification>> {
        let t = self.tables.read().await;
        let mut items = newest_first(
            t.notifications.iter().filter(|n| n.user_id == user_id),
            |n| n.created_at,
        );
        items.truncate(clamp_limit(limit) as usize);
        Ok(items)
    }

    async fn mark_notification_read(&self, id: Uuid) -> DataResult<()> {
        let mut t = self.tables.write().await;
        let notification = t
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| DataError::not_found("Notification", id))?;
        notification.read = true;
        Ok(())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> DataResult<u64> {
        let mut t = self.tables.write().await;
        let mut updated = 0;
        for n in t
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_notification(&self, id: Uuid) -> DataResult<()> {
        let mut t = self.tables.write().await;
        let before = t.notifications.len();
        t.notifications.retain(|n| n.id != id);
        if t.notifications.len() == before {
            return Err(DataError::not_found("Notification", id));
        }
        Ok(())
    }

    async fn clear_notifications(&self, user_id: Uuid) -> DataResult<u64> {
        let mut t = self.tables.write().await;
        let before = t.notifications.len();
        t.notifications.retain(|n| n.user_id != user_id);
        Ok((before - t.notifications.len()) as u64)
    }

    async fn unread_notification_count(&self, user_id: Uuid) -> DataResult<i64> {
        let t = self.tables.read().await;
        Ok(t.notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.read)
            .count() as i64)
    }

    // ========== Activity logs ==========

    async fn create_activity_log(&self, new: NewActivityLog) -> DataResult<ActivityLog> {
        let mut t = self.tables.write().await;
        if t.user(new.user_id).is_none() {
            return Err(DataError::validation("Referenced record does not exist"));
        }
        let log = ActivityLog {
            id: Uuid::new_v4(),
            action: new.action,
            description: new.description,
            user_id: new.user_id,
            user_name: new.user_name,
            metadata: new.metadata.unwrap_or_else(|| serde_json::json!({})),
            created_at: Utc::now(),
        };
        t.activity_logs.push(log.clone());
        Ok(log)
    }

    async fn get_activity_logs(&self, limit: i64) -> DataResult<Vec<ActivityLogEntry>> {
        let t = self.tables.read().await;
        Ok(newest_first(t.activity_logs.iter(), |l| l.created_at)
            .into_iter()
            .filter_map(|log| {
                let user = UserSummary::from(t.user(log.user_id)?);
                Some(ActivityLogEntry { log, user })
            })
            .take(clamp_limit(limit) as usize)
            .collect())
    }

    async fn get_user_activity_logs(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> DataResult<Vec<ActivityLog>> {
        let t = self.tables.read().await;
        let mut logs = newest_first(
            t.activity_logs.iter().filter(|l| l.user_id == user_id),
            |l| l.created_at,
        );
        logs.truncate(clamp_limit(limit) as usize);
        Ok(logs)
    }

    async fn prune_activity_logs(&self, days_to_keep: i64) -> DataResult<u64> {
        let Some(cutoff) = prune_cutoff(Utc::now(), days_to_keep) else {
            return Ok(0);
        };
        let mut t = self.tables.write().await;
        let before = t.activity_logs.len();
        t.activity_logs.retain(|l| l.created_at >= cutoff);
        Ok((before - t.activity_logs.len()) as u64)
    }

    // ========== Reports ==========

    async fn create_report(&self, new: NewReport) -> DataResult<CreatedReport> {
        let mut t = self.tables.write().await;
        let report = Report {
            id: Uuid::new_v4(),
            title: new.title,
            kind: new.kind,
            data: new.data,
            created_by_id: new.created_by_id,
            created_at: Utc::now(),
        };
        let created_by = t
            .user(report.created_by_id)
            .map(AuthorSummary::from)
            .ok_or_else(|| DataError::validation("Referenced record does not exist"))?;
        t.reports.push(report.clone());
        Ok(CreatedReport { report, created_by })
    }

    async fn get_reports(&self, filter: &ReportFilter) -> DataResult<Vec<ReportEntry>> {
        let t = self.tables.read().await;
        let kind = non_empty(&filter.kind);
        Ok(newest_first(
            t.reports.iter().filter(|r| {
                kind.map_or(true, |k| r.kind == k)
                    && filter.created_by_id.map_or(true, |id| r.created_by_id == id)
            }),
            |r| r.created_at,
        )
        .iter()
        .filter_map(|r| t.report_entry(r))
        .collect())
    }

    async fn delete_report(&self, id: Uuid) -> DataResult<()> {
        let mut t = self.tables.write().await;
        let before = t.reports.len();
        t.reports.retain(|r| r.id != id);
        if t.reports.len() == before {
            return Err(DataError::not_found("Report", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{NotificationType, Sentiment, UserRole};
    use chrono::Duration;

    async fn user(store: &MemoryStore, email: &str, role: UserRole) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                name: email.split('@').next().unwrap_or_default().to_string(),
                role,
            })
            .await
            .unwrap()
    }

    async fn employee(store: &MemoryStore, name: &str, email: &str, department: &str) -> Employee {
        store
            .create_employee(NewEmployee {
                name: name.to_string(),
                email: email.to_string(),
                department: department.to_string(),
                position: "Engineer".to_string(),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn new_feedback(employee_id: Uuid, author_id: Uuid, text: &str, sentiment: Sentiment) -> NewFeedback {
        NewFeedback {
            feedback: text.to_string(),
            sentiment,
            category: "Team Culture".to_string(),
            employee_id,
            author_id,
        }
    }

    fn notice(user_id: Uuid, title: &str) -> NewNotification {
        NewNotification {
            title: title.to_string(),
            message: "body".to_string(),
            kind: NotificationType::Info,
            user_id,
            action_url: None,
        }
    }

    #[tokio::test]
    async fn get_or_create_user_never_mutates_existing_row() {
        let store = MemoryStore::new();
        let first = store
            .get_or_create_user(NewUser {
                email: "lead@pulsecheck.dev".into(),
                name: "Team Lead".into(),
                role: UserRole::Lead,
            })
            .await
            .unwrap();
        let second = store
            .get_or_create_user(NewUser {
                email: "lead@pulsecheck.dev".into(),
                name: "Somebody Else".into(),
                role: UserRole::Hr,
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Team Lead");
        assert_eq!(second.role, UserRole::Lead);
    }

    #[tokio::test]
    async fn create_user_rejects_duplicate_email() {
        let store = MemoryStore::new();
        user(&store, "a@x.dev", UserRole::Employee).await;
        let dup = store
            .create_user(NewUser {
                email: "a@x.dev".into(),
                name: "A".into(),
                role: UserRole::Hr,
            })
            .await;
        assert!(matches!(dup, Err(DataError::Conflict(_))));
    }

    #[tokio::test]
    async fn user_and_employee_emails_are_linked_both_ways() {
        let store = MemoryStore::new();
        let early = user(&store, "john@company.com", UserRole::Employee).await;
        assert_eq!(early.employee_id, None);

        let john = employee(&store, "John", "john@company.com", "Engineering").await;
        let linked = store.get_user_by_id(early.id).await.unwrap().unwrap();
        assert_eq!(linked.employee_id, Some(john.id));

        let jane = employee(&store, "Jane", "jane@company.com", "Marketing").await;
        let late = store
            .get_or_create_user(NewUser {
                email: "jane@company.com".into(),
                name: "jane".into(),
                role: UserRole::Employee,
            })
            .await
            .unwrap();
        assert_eq!(late.employee_id, Some(jane.id));
    }

    #[tokio::test]
    async fn employees_filter_by_department_and_search() {
        let store = MemoryStore::new();
        employee(&store, "Zoe", "zoe@company.com", "Sales").await;
        employee(&store, "Adam", "adam@company.com", "Engineering").await;
        employee(&store, "Bea", "bea@other.org", "Engineering").await;

        let all = store.get_employees(&EmployeeFilter::default()).await.unwrap();
        let names: Vec<_> = all.iter().map(|e| e.employee.name.as_str()).collect();
        assert_eq!(names, vec!["Adam", "Bea", "Zoe"]);

        let eng = store
            .get_employees(&EmployeeFilter {
                department: Some("Engineering".into()),
                search: Some("COMPANY".into()),
            })
            .await
            .unwrap();
        assert_eq!(eng.len(), 1);
        assert_eq!(eng[0].employee.name, "Adam");
    }

    #[tokio::test]
    async fn employee_listing_attaches_five_latest_feedback() {
        let store = MemoryStore::new();
        let lead = user(&store, "lead@x.dev", UserRole::Lead).await;
        let emp = employee(&store, "John", "john@x.dev", "Engineering").await;
        for i in 0..7 {
            store
                .create_feedback(new_feedback(emp.id, lead.id, &format!("note {i}"), Sentiment::Neutral))
                .await
                .unwrap();
        }

        let listed = store.get_employees(&EmployeeFilter::default()).await.unwrap();
        assert_eq!(listed[0].feedback.len(), 5);
        assert_eq!(listed[0].feedback[0].feedback, "note 6");
        assert_eq!(listed[0].feedback[4].feedback, "note 2");
    }

    #[tokio::test]
    async fn score_out_of_range_is_rejected() {
        let store = MemoryStore::new();
        let result = store
            .create_employee(NewEmployee {
                name: "X".into(),
                email: "x@x.dev".into(),
                department: "D".into(),
                position: "P".into(),
                satisfaction_score: Some(150),
                join_date: None,
            })
            .await;
        assert!(matches!(result, Err(DataError::Validation(_))));

        let emp = employee(&store, "Y", "y@x.dev", "D").await;
        assert_eq!(emp.satisfaction_score, 0);
        let updated = store
            .update_employee(
                emp.id,
                EmployeeUpdate {
                    satisfaction_score: Some(-3),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(updated, Err(DataError::Validation(_))));
    }

    #[tokio::test]
    async fn update_employee_applies_partial_fields() {
        let store = MemoryStore::new();
        let emp = employee(&store, "Old", "old@x.dev", "Sales").await;
        let updated = store
            .update_employee(
                emp.id,
                EmployeeUpdate {
                    position: Some("Lead".into()),
                    satisfaction_score: Some(77),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Old");
        assert_eq!(updated.position, "Lead");
        assert_eq!(updated.satisfaction_score, 77);

        let missing = store.update_employee(Uuid::new_v4(), EmployeeUpdate::default()).await;
        assert!(matches!(missing, Err(DataError::NotFound { .. })));
    }

    #[tokio::test]
    async fn deleting_employee_with_feedback_is_rejected() {
        let store = MemoryStore::new();
        let lead = user(&store, "lead@x.dev", UserRole::Lead).await;
        let emp = employee(&store, "John", "john@x.dev", "Engineering").await;
        let fb = store
            .create_feedback(new_feedback(emp.id, lead.id, "ok", Sentiment::Positive))
            .await
            .unwrap();

        let blocked = store.delete_employee(emp.id).await;
        assert!(matches!(blocked, Err(DataError::Conflict(_))));

        store.delete_feedback(fb.feedback.id).await.unwrap();
        store.delete_employee(emp.id).await.unwrap();
        assert!(store.get_employee(emp.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn feedback_with_unknown_references_writes_nothing() {
        let store = MemoryStore::new();
        let lead = user(&store, "lead@x.dev", UserRole::Lead).await;
        let emp = employee(&store, "John", "john@x.dev", "Engineering").await;

        let bad_employee = store
            .create_feedback(new_feedback(Uuid::new_v4(), lead.id, "x", Sentiment::Neutral))
            .await;
        let bad_author = store
            .create_feedback(new_feedback(emp.id, Uuid::new_v4(), "x", Sentiment::Neutral))
            .await;

        assert!(bad_employee.is_err());
        assert!(bad_author.is_err());
        assert!(store.get_feedback(&FeedbackFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn created_feedback_is_joined_with_employee_and_author() {
        let store = MemoryStore::new();
        let lead = user(&store, "lead@x.dev", UserRole::Lead).await;
        let emp = employee(&store, "John", "john@x.dev", "Engineering").await;

        let created = store
            .create_feedback(new_feedback(emp.id, lead.id, "Great job", Sentiment::Positive))
            .await
            .unwrap();
        assert_eq!(created.employee, emp);
        assert_eq!(created.author.email, "lead@x.dev");
        assert_eq!(created.feedback.sentiment, Sentiment::Positive);
    }

    #[tokio::test]
    async fn feedback_filters_by_employee_newest_first() {
        let store = MemoryStore::new();
        let lead = user(&store, "lead@x.dev", UserRole::Lead).await;
        let john = employee(&store, "John", "john@x.dev", "Engineering").await;
        let jane = employee(&store, "Jane", "jane@x.dev", "Marketing").await;

        for (emp, text) in [(&john, "first"), (&jane, "other"), (&john, "second"), (&john, "third")] {
            store
                .create_feedback(new_feedback(emp.id, lead.id, text, Sentiment::Neutral))
                .await
                .unwrap();
        }

        let entries = store
            .get_feedback(&FeedbackFilter {
                employee_id: Some(john.id),
                ..Default::default()
            })
            .await
            .unwrap();
        let texts: Vec<_> = entries.iter().map(|e| e.feedback.feedback.as_str()).collect();
        assert_eq!(texts, vec!["third", "second", "first"]);
        assert!(entries.iter().all(|e| e.feedback.employee_id == john.id));
        assert!(entries
            .windows(2)
            .all(|w| w[0].feedback.created_at >= w[1].feedback.created_at));
        assert_eq!(entries[0].employee.department, "Engineering");
        assert_eq!(entries[0].author.name, "lead");
    }

    #[tokio::test]
    async fn feedback_filters_by_sentiment_category_and_text() {
        let store = MemoryStore::new();
        let lead = user(&store, "lead@x.dev", UserRole::Lead).await;
        let emp = employee(&store, "John", "john@x.dev", "Engineering").await;
        store
            .create_feedback(new_feedback(emp.id, lead.id, "Great teamwork", Sentiment::Positive))
            .await
            .unwrap();
        let mut other = new_feedback(emp.id, lead.id, "Tools are clunky", Sentiment::Negative);
        other.category = "Tools & Resources".into();
        store.create_feedback(other).await.unwrap();

        let negative = store
            .get_feedback(&FeedbackFilter {
                sentiment: Some(Sentiment::Negative),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(negative.len(), 1);

        let by_category = store
            .get_feedback(&FeedbackFilter {
                category: Some("Team Culture".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_category[0].feedback.feedback, "Great teamwork");

        let search = store
            .get_feedback(&FeedbackFilter {
                search: Some("CLUNKY".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].feedback.sentiment, Sentiment::Negative);
    }

    #[tokio::test]
    async fn mark_all_read_zeroes_unread_count_idempotently() {
        let store = MemoryStore::new();
        let u = user(&store, "u@x.dev", UserRole::Employee).await;
        let other = user(&store, "o@x.dev", UserRole::Employee).await;
        for i in 0..3 {
            store.create_notification(notice(u.id, &format!("n{i}"))).await.unwrap();
        }
        store.create_notification(notice(other.id, "theirs")).await.unwrap();

        assert_eq!(store.unread_notification_count(u.id).await.unwrap(), 3);
        assert_eq!(store.mark_all_notifications_read(u.id).await.unwrap(), 3);
        assert_eq!(store.unread_notification_count(u.id).await.unwrap(), 0);
        assert_eq!(store.mark_all_notifications_read(u.id).await.unwrap(), 0);
        assert_eq!(store.unread_notification_count(u.id).await.unwrap(), 0);
        assert_eq!(store.unread_notification_count(other.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn notifications_list_newest_first_with_limit() {
        let store = MemoryStore::new();
        let u = user(&store, "u@x.dev", UserRole::Employee).await;
        for i in 0..4 {
            store.create_notification(notice(u.id, &format!("n{i}"))).await.unwrap();
        }
        let listed = store.get_user_notifications(u.id, 2).await.unwrap();
        let titles: Vec<_> = listed.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["n3", "n2"]);
    }

    #[tokio::test]
    async fn notification_mutations_are_visible_immediately() {
        let store = MemoryStore::new();
        let u = user(&store, "u@x.dev", UserRole::Employee).await;
        let a = store.create_notification(notice(u.id, "a")).await.unwrap();
        let b = store.create_notification(notice(u.id, "b")).await.unwrap();

        store.mark_notification_read(a.id).await.unwrap();
        assert_eq!(store.unread_notification_count(u.id).await.unwrap(), 1);

        store.delete_notification(b.id).await.unwrap();
        assert_eq!(store.unread_notification_count(u.id).await.unwrap(), 0);
        assert!(matches!(
            store.delete_notification(b.id).await,
            Err(DataError::NotFound { .. })
        ));

        store.create_notification(notice(u.id, "c")).await.unwrap();
        assert_eq!(store.clear_notifications(u.id).await.unwrap(), 2);
        assert!(store.get_user_notifications(u.id, 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn notification_for_unknown_user_is_rejected() {
        let store = MemoryStore::new();
        let result = store.create_notification(notice(Uuid::new_v4(), "x")).await;
        assert!(matches!(result, Err(DataError::Validation(_))));
    }

    #[tokio::test]
    async fn prune_removes_only_old_activity() {
        let store = MemoryStore::new();
        let u = user(&store, "u@x.dev", UserRole::Hr).await;
        let mut ids = Vec::new();
        for action in ["login", "create", "delete"] {
            let log = store
                .create_activity_log(NewActivityLog {
                    action: action.into(),
                    description: action.into(),
                    user_id: u.id,
                    user_name: "u".into(),
                    metadata: None,
                })
                .await
                .unwrap();
            ids.push(log.id);
        }
        store.backdate_activity_log(ids[0], Utc::now() - Duration::days(120)).await;
        store.backdate_activity_log(ids[1], Utc::now() - Duration::days(91)).await;

        assert_eq!(store.prune_activity_logs(90).await.unwrap(), 2);
        let remaining = store.get_user_activity_logs(u.id, 50).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].action, "delete");
        assert_eq!(remaining[0].metadata, serde_json::json!({}));
    }

    #[tokio::test]
    async fn prune_with_unrepresentable_window_keeps_everything() {
        let store = MemoryStore::new();
        let u = user(&store, "u@x.dev", UserRole::Hr).await;
        let log = store
            .create_activity_log(NewActivityLog {
                action: "login".into(),
                description: "login".into(),
                user_id: u.id,
                user_name: "u".into(),
                metadata: None,
            })
            .await
            .unwrap();
        store.backdate_activity_log(log.id, Utc::now() - Duration::days(365 * 200)).await;

        assert_eq!(store.prune_activity_logs(i64::MAX).await.unwrap(), 0);
        assert_eq!(store.get_user_activity_logs(u.id, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn activity_listing_joins_user_projection() {
        let store = MemoryStore::new();
        let hr = user(&store, "hr@x.dev", UserRole::Hr).await;
        store
            .create_activity_log(NewActivityLog {
                action: "login".into(),
                description: "logged into the system".into(),
                user_id: hr.id,
                user_name: "snapshot name".into(),
                metadata: Some(serde_json::json!({"ip": "127.0.0.1"})),
            })
            .await
            .unwrap();
        let logs = store.get_activity_logs(100).await.unwrap();
        assert_eq!(logs[0].user.role, UserRole::Hr);
        assert_eq!(logs[0].log.user_name, "snapshot name");
        assert_eq!(logs[0].log.metadata["ip"], "127.0.0.1");
    }

    #[tokio::test]
    async fn reports_filter_by_type_and_creator() {
        let store = MemoryStore::new();
        let hr = user(&store, "hr@x.dev", UserRole::Hr).await;
        let other = user(&store, "hr2@x.dev", UserRole::Hr).await;
        for (by, kind) in [(&hr, "Satisfaction"), (&hr, "Engagement"), (&other, "Satisfaction")] {
            store
                .create_report(NewReport {
                    title: format!("{kind} report"),
                    kind: kind.into(),
                    data: serde_json::json!({"averageScore": 80}),
                    created_by_id: by.id,
                })
                .await
                .unwrap();
        }

        let satisfaction = store
            .get_reports(&ReportFilter {
                kind: Some("Satisfaction".into()),
                created_by_id: None,
            })
            .await
            .unwrap();
        assert_eq!(satisfaction.len(), 2);

        let mine = store
            .get_reports(&ReportFilter {
                kind: Some("Satisfaction".into()),
                created_by_id: Some(hr.id),
            })
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].created_by.email, "hr@x.dev");

        store.delete_report(mine[0].report.id).await.unwrap();
        assert_eq!(store.get_reports(&ReportFilter::default()).await.unwrap().len(), 2);
    }
}
