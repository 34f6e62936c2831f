//! HTTP API
//!
//! Every route except register, login, logout and health requires a session
//! cookie; see [`crate::session::AuthUser`].

mod auth;
mod data;
mod plaid;


use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use tower_http::trace::TraceLayer;

use crate::main_lib::AppState;

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/user", get(auth::current_user))
        .route("/api/plaid/create-link-token", post(plaid::create_link_token))
        .route("/api/plaid/exchange-token", post(plaid::exchange_token))
        .route("/api/plaid/sync", post(plaid::sync))
        .route("/api/items", get(data::items))
        .route("/api/accounts", get(data::accounts))
        .route("/api/transactions", get(data::transactions))
        .route("/api/investments/holdings", get(data::holdings))
        .route("/api/dashboard", get(data::dashboard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}
