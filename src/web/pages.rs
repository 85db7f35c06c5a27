//! Role-gated dashboard routes. Each returns the data its page renders as JSON;
//! guard failures are a `303` to `/login`.

use crate::db::Store;
use crate::domain::models::{
    Employee, EmployeeFilter, EmployeeWithFeedback, FeedbackEntry, FeedbackFilter, ReportEntry,
    ReportFilter, Sentiment, UserRole,
};
use crate::services::notifications::NotificationSnapshot;
use crate::state::SharedState;
use crate::web::auth::logout;
use crate::web::guard::{landing_target, require_role, require_session};
use crate::web::session::{MaybeSession, Session, SessionUser};
use axum::{
    extract::State,
    response::Redirect,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

type PageResult<T> = Result<Json<PageView<T>>, Redirect>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView<T: Serialize> {
    pub page: &'static str,
    pub user: SessionUser,
    pub notifications: NotificationSnapshot,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_employees: usize,
    pub average_satisfaction: f64,
    pub total_feedback: usize,
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

impl DashboardSummary {
    pub fn compute(employees: &[EmployeeWithFeedback], feedback: &[FeedbackEntry]) -> Self {
        let total_employees = employees.len();
        let average_satisfaction = if total_employees == 0 {
            0.0
        } else {
            let sum: i64 = employees
                .iter()
                .map(|e| i64::from(e.employee.satisfaction_score))
                .sum();
            (sum as f64 / total_employees as f64 * 10.0).round() / 10.0
        };
        let count = |s: Sentiment| feedback.iter().filter(|f| f.feedback.sentiment == s).count();
        Self {
            total_employees,
            average_satisfaction,
            total_feedback: feedback.len(),
            positive: count(Sentiment::Positive),
            neutral: count(Sentiment::Neutral),
            negative: count(Sentiment::Negative),
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login_page))
        .route("/logout", get(logout))
        .route("/hr-dashboard", get(hr_dashboard))
        .route("/hr-dashboard/employees", get(hr_employees))
        .route("/hr-dashboard/reports", get(hr_reports))
        .route("/lead-dashboard", get(lead_dashboard))
        .route("/lead-dashboard/feedback", get(lead_feedback))
        .route("/employee-dashboard", get(employee_dashboard))
        .route("/settings", get(settings))
        .with_state(state)
}

async fn home(MaybeSession(session): MaybeSession) -> Redirect {
    Redirect::to(landing_target(session.as_ref()))
}

async fn login_page(MaybeSession(session): MaybeSession) -> Json<Value> {
    Json(json!({ "page": "login", "authenticated": session.is_some() }))
}

// ========== HR ==========

async fn hr_dashboard(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_role(session, UserRole::Hr)?;
    let employees = load_employees(state.store.as_ref()).await;
    let feedback = load_feedback(state.store.as_ref(), &FeedbackFilter::default()).await;
    let summary = DashboardSummary::compute(&employees, &feedback);
    let data = json!({ "summary": summary, "employees": employees, "feedback": feedback });
    Ok(view(&state, session, "hr-dashboard", data).await)
}

async fn hr_employees(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_role(session, UserRole::Hr)?;
    let employees = load_employees(state.store.as_ref()).await;
    let feedback = load_feedback(state.store.as_ref(), &FeedbackFilter::default()).await;
    let data = json!({ "employees": employees, "feedback": feedback });
    Ok(view(&state, session, "hr-employees", data).await)
}

async fn hr_reports(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_role(session, UserRole::Hr)?;
    let reports: Vec<ReportEntry> = state
        .store
        .get_reports(&ReportFilter::default())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to load reports: {}", e);
            Vec::new()
        });
    let employees = load_employees(state.store.as_ref()).await;
    let data = json!({ "reports": reports, "employees": employees });
    Ok(view(&state, session, "hr-reports", data).await)
}

// ========== Lead ==========

async fn lead_dashboard(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_role(session, UserRole::Lead)?;
    let employees = load_employees(state.store.as_ref()).await;
    Ok(view(&state, session, "lead-dashboard", json!({ "employees": employees })).await)
}

async fn lead_feedback(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_role(session, UserRole::Lead)?;
    let feedback = load_feedback(state.store.as_ref(), &FeedbackFilter::default()).await;
    Ok(view(&state, session, "lead-feedback", json!({ "feedback": feedback })).await)
}

// ========== Employee ==========

async fn employee_dashboard(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_role(session, UserRole::Employee)?;
    let employee = resolve_employee(state.store.as_ref(), &session).await;
    let my_feedback = match &employee {
        Some(e) => {
            let filter = FeedbackFilter {
                employee_id: Some(e.id),
                ..Default::default()
            };
            load_feedback(state.store.as_ref(), &filter).await
        }
        None => Vec::new(),
    };
    let data = json!({
        "employeeId": employee.as_ref().map(|e| e.id),
        "employee": employee,
        "myFeedback": my_feedback,
    });
    Ok(view(&state, session, "employee-dashboard", data).await)
}

async fn settings(
    State(state): State<SharedState>,
    MaybeSession(session): MaybeSession,
) -> PageResult<Value> {
    let session = require_session(session)?;
    Ok(view(&state, session, "settings", json!({})).await)
}

// ========== Helpers ==========

async fn view<T: Serialize>(
    state: &SharedState,
    session: Session,
    page: &'static str,
    data: T,
) -> Json<PageView<T>> {
    let notifications = state
        .notifications
        .get(state.store.as_ref(), session.user.id)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to load notifications for {}: {}", session.user.id, e);
            NotificationSnapshot::default()
        });
    Json(PageView {
        page,
        user: session.user,
        notifications,
        data,
    })
}

async fn load_employees(store: &dyn Store) -> Vec<EmployeeWithFeedback> {
    store
        .get_employees(&EmployeeFilter::default())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to load employees: {}", e);
            Vec::new()
        })
}

async fn load_feedback(store: &dyn Store, filter: &FeedbackFilter) -> Vec<FeedbackEntry> {
    store.get_feedback(filter).await.unwrap_or_else(|e| {
        tracing::error!("Failed to load feedback: {}", e);
        Vec::new()
    })
}

/// Linked employee record, falling back to an email match for unlinked accounts.
pub(crate) async fn resolve_employee(store: &dyn Store, session: &Session) -> Option<Employee> {
    let linked = match store.get_user_by_id(session.user.id).await {
        Ok(user) => user.and_then(|u| u.employee_id),
        Err(e) => {
            tracing::warn!("Failed to load user {}: {}", session.user.id, e);
            None
        }
    };
    if let Some(id) = linked {
        if let Ok(Some(employee)) = store.get_employee(id).await {
            return Some(employee);
        }
    }

    let filter = EmployeeFilter {
        department: None,
        search: Some(session.user.email.clone()),
    };
    store
        .get_employees(&filter)
        .await
        .ok()?
        .into_iter()
        .map(|e| e.employee)
        .find(|e| e.email == session.user.email)
}
