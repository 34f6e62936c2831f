//! Session cookie handling

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};

use finboard_core::Id;

use crate::error::ApiError;
use crate::main_lib::AppState;

pub const SESSION_COOKIE: &str = "finboard.sid";

/// The caller behind a valid session cookie
///
/// Rejects with 401 when the cookie is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Id,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let token = session_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let user_id = state
            .auth_service
            .resolve(&token)?
            .ok_or_else(ApiError::unauthorized)?;
        Ok(Self { user_id, token })
    }
}

/// Session token from the request's `Cookie` headers
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub fn set_cookie(token: &str, ttl: Duration) -> (axum::http::HeaderName, HeaderValue) {
    cookie_header(format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    ))
}

pub fn clear_cookie() -> (axum::http::HeaderName, HeaderValue) {
    cookie_header(format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        SESSION_COOKIE
    ))
}

// Tokens are URL-safe base64, so the value is always a valid header
fn cookie_header(value: String) -> (axum::http::HeaderName, HeaderValue) {
    let value = HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static(""));
    (SET_COOKIE, value)
}
