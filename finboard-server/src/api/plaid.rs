//! Bank linking and sync

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use finboard_core::ports::LinkToken;
use finboard_core::services::SyncReport;
use finboard_core::LinkedItem;

use crate::error::{ApiResult, PublicMessage};
use crate::main_lib::AppState;
use crate::session::AuthUser;

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    #[serde(default)]
    public_token: String,
    #[serde(default)]
    institution_id: Option<String>,
}

pub async fn create_link_token(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<LinkToken>> {
    let token = state
        .link_service
        .create_link_token(auth.user_id)
        .await
        .public("Failed to create link token")?;
    Ok(Json(token))
}

/// Link a new item and run its first sync
pub async fn exchange_token(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ExchangeRequest>,
) -> ApiResult<Json<LinkedItem>> {
    let outcome = state
        .link_service
        .exchange(
            auth.user_id,
            &body.public_token,
            body.institution_id.as_deref(),
        )
        .await
        .public("Failed to exchange token")?;
    Ok(Json(outcome.item))
}

/// Resync every item the caller has linked
pub async fn sync(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<SyncReport>>> {
    let reports = state
        .sync_service
        .sync_user(auth.user_id)
        .await
        .public("Failed to sync")?;
    Ok(Json(reports))
}
