use crate::db::Store;
use crate::domain::models::{NewUser, User, UserRole};
use crate::middleware::client_ip;
use crate::services::activity::log_activity;
use crate::state::SharedState;
use crate::web::error::ApiError;
use crate::web::session::{
    clear_session_cookie, session_cookie, sign_session, CurrentSession, Session, SessionUser,
};
use crate::web::{ok, ApiResult};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, SaltString},
    Argon2, PasswordVerifier,
};
use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequest, Request, State},
    http::{
        header::{CONTENT_TYPE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use validator::Validate;

/// The single password accepted for every account, kept only as an Argon2 hash.
pub struct SharedSecret {
    hash: String,
}

impl SharedSecret {
    pub fn new(password: &str) -> Result<Self, argon2::password_hash::Error> {
        let salt = SaltString::generate(rand_core::OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)?
            .to_string();
        Ok(Self { hash })
    }

    pub fn verify(&self, candidate: &str) -> bool {
        PasswordHash::new(&self.hash)
            .and_then(|parsed| Argon2::default().verify_password(candidate.as_bytes(), &parsed))
            .is_ok()
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AuthError {
    #[error("Please enter a valid email and password.")]
    InvalidInput,
    #[error("Invalid email or password.")]
    InvalidCredentials,
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = match err {
            AuthError::InvalidInput => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        };
        ApiError::new(status, err.to_string())
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default)]
    #[validate(email)]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,
}

/// Login body, accepted as JSON or urlencoded form. Unparseable bodies
/// become an empty form and fail validation.
pub struct LoginPayload(pub LoginForm);

#[async_trait]
impl<S> FromRequest<S> for LoginPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |ct| ct.starts_with("application/x-www-form-urlencoded"));

        let form = if is_form {
            Form::<LoginForm>::from_request(req, state)
                .await
                .map(|Form(f)| f)
                .ok()
        } else {
            Json::<LoginForm>::from_request(req, state)
                .await
                .map(|Json(f)| f)
                .ok()
        };
        Ok(LoginPayload(form.unwrap_or_default()))
    }
}

/// Checks the credentials and returns the (possibly just created) account.
/// An existing account keeps its stored role.
pub async fn authenticate(
    store: &dyn Store,
    secret: &SharedSecret,
    form: &LoginForm,
) -> Result<User, AuthError> {
    let form = LoginForm {
        email: form.email.trim().to_string(),
        password: form.password.clone(),
    };
    form.validate().map_err(|_| AuthError::InvalidInput)?;
    if !secret.verify(&form.password) {
        return Err(AuthError::InvalidCredentials);
    }

    let email = form.email.as_str();
    let local_part = email.split('@').next().unwrap_or(email);
    store
        .get_or_create_user(NewUser {
            email: email.to_string(),
            name: local_part.to_string(),
            role: UserRole::Employee,
        })
        .await
        .map_err(|e| {
            tracing::error!("get_or_create_user failed for {}: {}", email, e);
            AuthError::InvalidCredentials
        })
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/session", get(current_session))
        .with_state(state)
}

async fn login(
    State(state): State<SharedState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    LoginPayload(form): LoginPayload,
) -> Result<Response, ApiError> {
    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    if !state.login_limiter.check(&ip).await {
        tracing::warn!("Login rate limit exceeded for IP: {}", ip);
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Too many login attempts. Please try again later.",
        ));
    }

    let user = authenticate(state.store.as_ref(), &state.password, &form).await?;
    let session = Session::new(SessionUser::from(&user));
    let token = sign_session(&session, &state.session_key).map_err(|e| {
        tracing::error!("Failed to sign session: {}", e);
        ApiError::internal("An unexpected error occurred. Please try again.")
    })?;
    let cookie = HeaderValue::from_str(&session_cookie(&token, state.secure_cookies))
        .map_err(|_| ApiError::internal("An unexpected error occurred. Please try again."))?;

    log_activity(
        state.store.as_ref(),
        user.id,
        &user.name,
        "login",
        "logged into the system",
        None,
    )
    .await;
    if let Err(e) = state.notifications.refresh(state.store.as_ref(), user.id).await {
        tracing::warn!("Failed to load notifications for {}: {}", user.id, e);
    }

    tracing::info!("User {} logged in as {}", user.email, user.role.session_name());

    let mut response_headers = HeaderMap::new();
    response_headers.insert(SET_COOKIE, cookie);
    let body = json!({ "success": true, "user": session.user, "redirect": "/" });
    Ok((response_headers, Json(body)).into_response())
}

pub async fn logout(State(state): State<SharedState>) -> impl IntoResponse {
    (
        [(SET_COOKIE, clear_session_cookie(state.secure_cookies))],
        Redirect::to("/login"),
    )
}

async fn current_session(CurrentSession(session): CurrentSession) -> ApiResult {
    ok("user", session.user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed, MemoryStore};
    use crate::web::test_support::{self, body_json, TestApp};
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn authenticate_keeps_stored_role() {
        let store = MemoryStore::new();
        seed::seed_all(&store).await.unwrap();
        let secret = SharedSecret::new("password").unwrap();

        let hr = authenticate(&store, &secret, &form("hr@pulsecheck.dev", "password"))
            .await
            .unwrap();
        assert_eq!(hr.role, UserRole::Hr);
        assert_eq!(SessionUser::from(&hr).role.session_name(), "hr");

        let fresh = authenticate(&store, &secret, &form("new.person@company.com", "password"))
            .await
            .unwrap();
        assert_eq!(fresh.role, UserRole::Employee);
        assert_eq!(fresh.name, "new.person");
    }

    #[tokio::test]
    async fn authenticate_trims_email_before_validating() {
        let store = MemoryStore::new();
        seed::seed_all(&store).await.unwrap();
        let secret = SharedSecret::new("password").unwrap();

        let hr = authenticate(&store, &secret, &form("  hr@pulsecheck.dev ", "password"))
            .await
            .unwrap();
        assert_eq!(hr.email, "hr@pulsecheck.dev");
        assert_eq!(hr.role, UserRole::Hr);
    }

    #[tokio::test]
    async fn authenticate_rejects_bad_input_and_password() {
        let store = MemoryStore::new();
        let secret = SharedSecret::new("password").unwrap();

        assert_eq!(
            authenticate(&store, &secret, &form("not-an-email", "password")).await,
            Err(AuthError::InvalidInput)
        );
        assert_eq!(
            authenticate(&store, &secret, &form("a@b.dev", "")).await,
            Err(AuthError::InvalidInput)
        );
        assert_eq!(
            authenticate(&store, &secret, &form("a@b.dev", "hunter2")).await,
            Err(AuthError::InvalidCredentials)
        );
        assert!(store.get_user_by_email("a@b.dev").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn login_sets_cookie_and_logs_activity() {
        let app = TestApp::seeded().await;
        let response = app
            .call(test_support::json_request(
                "POST",
                "/auth/login",
                None,
                json!({"email": "lead@pulsecheck.dev", "password": "password"}),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("session="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=604800"));

        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["redirect"], "/");
        assert_eq!(body["user"]["role"], "lead");

        let lead = app.user("lead@pulsecheck.dev").await;
        let logs = app.state.store.get_user_activity_logs(lead.id, 10).await.unwrap();
        assert_eq!(logs[0].action, "login");
        assert_eq!(logs[0].description, "logged into the system");
    }

    #[tokio::test]
    async fn login_accepts_form_bodies() {
        let app = TestApp::seeded().await;
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/auth/login")
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("email=hr%40pulsecheck.dev&password=password"))
            .unwrap();
        let response = app.call(request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["user"]["role"], "hr");
    }

    #[tokio::test]
    async fn wrong_password_sets_no_cookie() {
        let app = TestApp::seeded().await;
        let response = app
            .call(test_support::json_request(
                "POST",
                "/auth/login",
                None,
                json!({"email": "hr@pulsecheck.dev", "password": "wrong"}),
            ))
            .await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(SET_COOKIE).is_none());
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Invalid email or password.");
    }

    #[tokio::test]
    async fn malformed_login_is_a_bad_request() {
        let app = TestApp::seeded().await;
        let response = app
            .call(test_support::json_request(
                "POST",
                "/auth/login",
                None,
                json!({"email": "nobody"}),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Please enter a valid email and password."
        );
    }

    #[tokio::test]
    async fn login_is_rate_limited_per_forwarded_ip() {
        let app = TestApp::seeded().await;
        let attempt = |ip: &'static str| {
            let mut request = test_support::json_request(
                "POST",
                "/auth/login",
                None,
                json!({"email": "hr@pulsecheck.dev", "password": "wrong"}),
            );
            request
                .headers_mut()
                .insert("x-forwarded-for", HeaderValue::from_static(ip));
            request
        };

        for _ in 0..5 {
            let response = app.call(attempt("198.51.100.4")).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let blocked = app.call(attempt("198.51.100.4")).await;
        assert_eq!(blocked.status(), StatusCode::TOO_MANY_REQUESTS);

        let other = app.call(attempt("198.51.100.5")).await;
        assert_eq!(other.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn logout_clears_cookie_and_redirects() {
        let app = TestApp::seeded().await;
        let cookie = app.cookie_for("hr@pulsecheck.dev").await;

        for (method, uri) in [("POST", "/auth/logout"), ("GET", "/logout")] {
            let response = app
                .call(test_support::request(method, uri, Some(&cookie)))
                .await;
            assert_eq!(response.status(), StatusCode::SEE_OTHER);
            assert_eq!(response.headers()["location"], "/login");
            let set = response.headers()[SET_COOKIE].to_str().unwrap();
            assert!(set.starts_with("session=;"));
            assert!(set.contains("Max-Age=0"));
        }
    }

    #[tokio::test]
    async fn session_endpoint_reflects_cookie() {
        let app = TestApp::seeded().await;
        let anonymous = app.call(test_support::request("GET", "/auth/session", None)).await;
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

        let cookie = app.cookie_for("john.doe@company.com").await;
        let response = app
            .call(test_support::request("GET", "/auth/session", Some(&cookie)))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["user"]["email"], "john.doe@company.com");
        assert_eq!(body["user"]["role"], "employee");
    }
}
