//! Registration, login and the session user

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use tracing::debug;

use finboard_core::User;

use crate::error::{ApiResult, PublicMessage};
use crate::main_lib::AppState;
use crate::session::{clear_cookie, session_token, set_cookie, AuthUser};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let (user, session) = state
        .auth_service
        .register(&body.username, &body.password)
        .await
        .public("Failed to register")?;
    let cookie = set_cookie(&session.token, state.config.session_ttl);
    Ok((StatusCode::CREATED, [cookie], Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> ApiResult<impl IntoResponse> {
    let (user, session) = state
        .auth_service
        .login(&body.username, &body.password)
        .await
        .public("Failed to log in")?;
    let cookie = set_cookie(&session.token, state.config.session_ttl);
    Ok(([cookie], Json(user)))
}

/// Always succeeds; an unknown or missing session is already logged out
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    if let Some(token) = session_token(&headers) {
        let removed = state.auth_service.logout(&token).public("Failed to log out")?;
        debug!(removed, "logout");
    }
    Ok((StatusCode::OK, [clear_cookie()]))
}

pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<User>> {
    let user = state
        .auth_service
        .current_user(&auth.token)
        .await
        .public("Failed to fetch user")?;
    Ok(Json(user))
}
