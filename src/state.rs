use crate::config::AppConfig;
use crate::db::Store;
use crate::middleware::RateLimiter;
use crate::services::ai::AiService;
use crate::services::notifications::NotificationCache;
use crate::web::auth::SharedSecret;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub notifications: Arc<NotificationCache>,
    pub ai: Arc<AiService>,
    pub session_key: Vec<u8>,
    pub password: Arc<SharedSecret>,
    pub secure_cookies: bool,
    pub login_limiter: RateLimiter,
}

impl AppState {
    pub fn new(config: &AppConfig, store: Arc<dyn Store>, password: SharedSecret) -> Self {
        Self {
            store,
            notifications: Arc::new(NotificationCache::new()),
            ai: Arc::new(AiService::new(
                config.openai_api_key.clone(),
                config.openai_model.clone(),
            )),
            session_key: config.session_key.clone(),
            password: Arc::new(password),
            secure_cookies: config.production,
            login_limiter: RateLimiter::for_login(),
        }
    }
}

pub type SharedState = Arc<AppState>;
