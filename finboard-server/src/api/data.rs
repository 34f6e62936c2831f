//! Read endpoints, all scoped to the session user

use axum::extract::State;
use axum::Json;

use finboard_core::services::DashboardSummary;
use finboard_core::{Account, HoldingView, LinkedItem, Transaction};

use crate::error::{ApiResult, PublicMessage};
use crate::main_lib::AppState;
use crate::session::AuthUser;

pub async fn items(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<LinkedItem>>> {
    let items = state
        .query_service
        .linked_items_for_user(auth.user_id)
        .await
        .public("Failed to fetch items")?;
    Ok(Json(items))
}

pub async fn accounts(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<Account>>> {
    let accounts = state
        .query_service
        .accounts_for_user(auth.user_id)
        .await
        .public("Failed to fetch accounts")?;
    Ok(Json(accounts))
}

pub async fn transactions(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<Transaction>>> {
    let transactions = state
        .query_service
        .transactions_for_user(auth.user_id)
        .await
        .public("Failed to fetch transactions")?;
    Ok(Json(transactions))
}

pub async fn holdings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<Vec<HoldingView>>> {
    let holdings = state
        .query_service
        .holdings_for_user(auth.user_id)
        .await
        .public("Failed to fetch holdings")?;
    Ok(Json(holdings))
}

pub async fn dashboard(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<DashboardSummary>> {
    let summary = state
        .dashboard_service
        .summary_for_user(auth.user_id)
        .await
        .public("Failed to build dashboard")?;
    Ok(Json(summary))
}
