use crate::domain::models::{User, UserRole};
use crate::state::SharedState;
use crate::web::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::COOKIE, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::convert::Infallible;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const SESSION_COOKIE: &str = "session";
pub const SESSION_TTL_DAYS: i64 = 7;

/// The identity carried in the cookie. `role` is serialized lower-case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(with = "session_role")]
    pub role: UserRole,
}

impl From<&User> for SessionUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    /// Unix timestamp after which the cookie is rejected.
    pub exp: i64,
}

impl Session {
    pub fn new(user: SessionUser) -> Self {
        let exp = (Utc::now() + Duration::days(SESSION_TTL_DAYS)).timestamp();
        Self { user, exp }
    }

    pub fn role(&self) -> UserRole {
        self.user.role
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid token format")]
    Invalid,
    #[error("signature mismatch")]
    Signature,
    #[error("expired")]
    Expired,
    #[error("bad role")]
    Role,
}

mod session_role {
    use crate::domain::models::UserRole;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(role: &UserRole, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(role.session_name())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<UserRole, D::Error> {
        let raw = String::deserialize(d)?;
        UserRole::from_session_name(&raw).ok_or_else(|| D::Error::custom("unknown role"))
    }
}

/// `base64(json) "." base64(hmac_sha256(json))`
pub fn sign_session(session: &Session, key: &[u8]) -> Result<String, SessionError> {
    let payload = serde_json::to_vec(session).map_err(|_| SessionError::Invalid)?;
    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload);
    let sig = mac.finalize().into_bytes();
    Ok(format!(
        "{}.{}",
        general_purpose::STANDARD.encode(&payload),
        general_purpose::STANDARD.encode(sig)
    ))
}

pub fn verify_session(token: &str, key: &[u8]) -> Result<Session, SessionError> {
    let (payload_b64, sig_b64) = token.split_once('.').ok_or(SessionError::Invalid)?;
    let payload = general_purpose::STANDARD
        .decode(payload_b64)
        .map_err(|_| SessionError::Invalid)?;
    let sig = general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| SessionError::Invalid)?;

    let mut mac = HmacSha256::new_from_slice(key).map_err(|_| SessionError::Invalid)?;
    mac.update(&payload);
    mac.verify_slice(&sig).map_err(|_| SessionError::Signature)?;

    let value: serde_json::Value =
        serde_json::from_slice(&payload).map_err(|_| SessionError::Invalid)?;
    let role = value["user"]["role"].as_str();
    if role.and_then(UserRole::from_session_name).is_none() {
        return Err(SessionError::Role);
    }
    let session: Session = serde_json::from_value(value).map_err(|_| SessionError::Invalid)?;
    if Utc::now().timestamp() > session.exp {
        return Err(SessionError::Expired);
    }
    Ok(session)
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{SESSION_COOKIE}=");
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| pair.trim().strip_prefix(prefix.as_str()).map(str::to_string))
        .filter(|token| !token.is_empty())
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    let max_age = Duration::days(SESSION_TTL_DAYS).num_seconds();
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure_flag}")
}

pub fn clear_session_cookie(secure: bool) -> String {
    let secure_flag = if secure { "; Secure" } else { "" };
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0{secure_flag}")
}

/// Reads the current session, if any. Never fails.
pub fn read_session(headers: &HeaderMap, key: &[u8]) -> Option<Session> {
    let token = extract_token(headers)?;
    match verify_session(&token, key) {
        Ok(session) => Some(session),
        Err(e) => {
            tracing::debug!("Ignoring session cookie: {}", e);
            None
        }
    }
}

// ========== Extractors ==========

/// Session required; rejects with a `401` JSON body. Used by `/api` routes.
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);
        read_session(&parts.headers, &shared.session_key)
            .map(CurrentSession)
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Optional session for page routes, which redirect instead of rejecting.
pub struct MaybeSession(pub Option<Session>);

#[async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
    S: Send + Sync,
    SharedState: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let shared = SharedState::from_ref(state);
        Ok(MaybeSession(read_session(&parts.headers, &shared.session_key)))
    }
}
