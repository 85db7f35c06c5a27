use crate::domain::models::UserRole;
use crate::web::error::ApiError;
use crate::web::session::Session;
use axum::response::Redirect;

pub const LOGIN_PATH: &str = "/login";

pub fn login_redirect() -> Redirect {
    Redirect::to(LOGIN_PATH)
}

/// Exact role match; there is no role hierarchy.
pub fn require_role(session: Option<Session>, expected: UserRole) -> Result<Session, Redirect> {
    match session {
        Some(s) if s.role() == expected => Ok(s),
        _ => Err(login_redirect()),
    }
}

pub fn require_session(session: Option<Session>) -> Result<Session, Redirect> {
    session.ok_or_else(login_redirect)
}

/// Dashboard a visitor to `/` is sent to.
pub fn landing_target(session: Option<&Session>) -> &'static str {
    match session.map(Session::role) {
        Some(UserRole::Hr) => "/hr-dashboard",
        Some(UserRole::Lead) => "/lead-dashboard",
        Some(UserRole::Employee) => "/employee-dashboard",
        None => LOGIN_PATH,
    }
}

/// API counterpart of [`require_role`]: `403` instead of a redirect.
pub fn require_api_role(session: &Session, allowed: &[UserRole]) -> Result<(), ApiError> {
    if allowed.contains(&session.role()) {
        Ok(())
    } else {
        tracing::warn!(
            "{} ({}) denied access to a restricted API",
            session.user.email,
            session.role().session_name()
        );
        Err(ApiError::forbidden())
    }
}

pub fn require_hr(session: &Session) -> Result<(), ApiError> {
    require_api_role(session, &[UserRole::Hr])
}
