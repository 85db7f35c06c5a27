use crate::config::AppConfig;
use crate::db::{seed, MemoryStore, Store};
use crate::domain::models::User;
use crate::state::{AppState, SharedState};
use crate::web::auth::SharedSecret;
use crate::web::session::{sign_session, Session, SessionUser, SESSION_COOKIE};
use axum::body::{to_bytes, Body};
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub state: SharedState,
    /// Same tables as `state.store`, for test-only hooks.
    pub memory: MemoryStore,
}

impl TestApp {
    /// Router over a [`MemoryStore`] loaded with the demo dataset.
    pub async fn seeded() -> Self {
        let store = MemoryStore::new();
        seed::seed_all(&store).await.unwrap();
        let config = AppConfig::from_vars(|_| None).unwrap();
        let secret = SharedSecret::new(&config.shared_password).unwrap();
        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let state: SharedState = Arc::new(AppState::new(&config, shared, secret));
        Self {
            router: super::routes(state.clone()),
            state,
            memory: store,
        }
    }

    pub async fn call(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn user(&self, email: &str) -> User {
        self.state.store.get_user_by_email(email).await.unwrap().unwrap()
    }

    /// `session=<token>` for an existing account, skipping the login route.
    pub async fn cookie_for(&self, email: &str) -> String {
        let user = self.user(email).await;
        let token = sign_session(&Session::new(SessionUser::from(&user)), &self.state.session_key)
            .unwrap();
        format!("{SESSION_COOKIE}={token}")
    }
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
