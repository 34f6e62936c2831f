//! Mock Plaid API server for testing
//!
//! Serves the six Plaid endpoints the client uses with a small fixed data
//! set, on an ephemeral local port. Responses follow the real API shapes:
//! - POST /link/token/create returns { link_token, expiration, request_id }
//! - POST /item/public_token/exchange returns { access_token, item_id }
//! - POST /institutions/get_by_id returns { institution: { name, ... } }
//! - POST /accounts/get returns { accounts: [...] }
//! - POST /transactions/get returns { transactions: [...], total_transactions }
//! - POST /investments/holdings/get returns { holdings: [...], securities: [...] }
//!
//! Failures come back as Plaid error bodies with status 400.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value as JsonValue};
use tokio::task::JoinHandle;

/// Public token the mock accepts for exchange
pub const MOCK_PUBLIC_TOKEN: &str = "public-sandbox-ok";

pub const MOCK_INSTITUTION_NAME: &str = "First Platypus Bank";

/// Configuration for mock data and failure switches
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Reject every request with INVALID_API_KEYS
    pub fail_auth: bool,
    /// Answer 429 without a Plaid error body
    pub rate_limit: bool,
    /// Holdings endpoint answers PRODUCTS_NOT_SUPPORTED
    pub no_investments: bool,
    /// Transactions generated on top of the two fixed ones
    pub num_extra_transactions: usize,
}

struct MockState {
    config: MockConfig,
    used_public_tokens: Mutex<HashSet<String>>,
    counter: AtomicUsize,
}

/// Mock Plaid server for testing
pub struct MockPlaidServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl MockPlaidServer {
    /// Start a new mock server on a random available port
    pub async fn start(config: MockConfig) -> std::io::Result<Self> {
        let state = Arc::new(MockState {
            config,
            used_public_tokens: Mutex::new(HashSet::new()),
            counter: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/link/token/create", post(link_token_create))
            .route("/item/public_token/exchange", post(public_token_exchange))
            .route("/institutions/get_by_id", post(institution_get_by_id))
            .route("/accounts/get", post(accounts_get))
            .route("/transactions/get", post(transactions_get))
            .route("/investments/holdings/get", post(holdings_get))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { addr, handle })
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Get the base URL for this mock server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for MockPlaidServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn plaid_error(error_type: &str, error_code: &str, error_message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error_type": error_type,
            "error_code": error_code,
            "error_message": error_message,
            "display_message": null,
            "request_id": "mock-request",
        })),
    )
        .into_response()
}

/// Credential and failure-switch checks shared by every endpoint
fn gate(state: &MockState, headers: &HeaderMap) -> Option<Response> {
    if state.config.rate_limit {
        return Some((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response());
    }

    let client_id = headers
        .get("PLAID-CLIENT-ID")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let has_secret = headers.contains_key("PLAID-SECRET");

    if state.config.fail_auth || !client_id.starts_with("test_") || !has_secret {
        return Some(plaid_error(
            "INVALID_INPUT",
            "INVALID_API_KEYS",
            "invalid client_id or secret provided",
        ));
    }
    None
}

fn check_access_token(body: &JsonValue) -> Option<Response> {
    let token = body.get("access_token").and_then(|v| v.as_str()).unwrap_or("");
    if token.starts_with("access-sandbox-") {
        None
    } else {
        Some(plaid_error(
            "INVALID_INPUT",
            "INVALID_ACCESS_TOKEN",
            "provided access token is in an invalid format",
        ))
    }
}

async fn link_token_create(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(_body): Json<JsonValue>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }
    let n = state.counter.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "link_token": format!("link-sandbox-{}", n),
        "expiration": "2030-01-01T00:00:00Z",
        "request_id": "mock-request",
    }))
    .into_response()
}

async fn public_token_exchange(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }
    let token = body
        .get("public_token")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    // Public tokens are one-shot
    let fresh = token.starts_with("public-sandbox-")
        && state
            .used_public_tokens
            .lock()
            .map(|mut used| used.insert(token.clone()))
            .unwrap_or(false);
    if !fresh {
        return plaid_error(
            "INVALID_INPUT",
            "INVALID_PUBLIC_TOKEN",
            "provided public token is expired or has already been used",
        );
    }

    let n = state.counter.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "access_token": format!("access-sandbox-{}", n),
        "item_id": format!("item-{}", n),
        "request_id": "mock-request",
    }))
    .into_response()
}

async fn institution_get_by_id(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers) {
        return rejection;
    }
    let institution_id = body
        .get("institution_id")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    Json(json!({
        "institution": {
            "institution_id": institution_id,
            "name": MOCK_INSTITUTION_NAME,
            "country_codes": ["US"],
        },
        "request_id": "mock-request",
    }))
    .into_response()
}

async fn accounts_get(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers).or_else(|| check_access_token(&body)) {
        return rejection;
    }
    Json(json!({
        "accounts": [
            {
                "account_id": "acc-checking",
                "name": "Plaid Checking",
                "type": "depository",
                "subtype": "checking",
                "balances": { "current": 1000.0, "iso_currency_code": "USD" },
            },
            {
                "account_id": "acc-invest",
                "name": "Plaid Brokerage",
                "type": "investment",
                "subtype": null,
                "balances": { "current": null, "iso_currency_code": null },
            },
        ],
        "request_id": "mock-request",
    }))
    .into_response()
}

async fn transactions_get(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers).or_else(|| check_access_token(&body)) {
        return rejection;
    }

    let mut all = vec![
        json!({
            "transaction_id": "tx-1",
            "account_id": "acc-checking",
            "date": "2025-01-10",
            "name": "Restaurant",
            "amount": 50.0,
            "category": ["Food and Drink", "Restaurants"],
            "pending": false,
        }),
        json!({
            "transaction_id": "tx-2",
            "account_id": "acc-checking",
            "date": "2025-01-11",
            "name": "Refund",
            "amount": -20.0,
            "category": null,
            "pending": true,
        }),
    ];
    for i in 0..state.config.num_extra_transactions {
        all.push(json!({
            "transaction_id": format!("tx-extra-{}", i),
            "account_id": "acc-checking",
            "date": "2025-01-12",
            "name": "Transit",
            "amount": 1.25,
            "category": ["Travel"],
            "pending": false,
        }));
    }

    let options = body.get("options");
    let count = options
        .and_then(|o| o.get("count"))
        .and_then(|v| v.as_u64())
        .unwrap_or(100) as usize;
    let offset = options
        .and_then(|o| o.get("offset"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as usize;

    let total = all.len();
    let page: Vec<JsonValue> = all.into_iter().skip(offset).take(count).collect();
    Json(json!({
        "transactions": page,
        "total_transactions": total,
        "request_id": "mock-request",
    }))
    .into_response()
}

async fn holdings_get(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<JsonValue>,
) -> Response {
    if let Some(rejection) = gate(&state, &headers).or_else(|| check_access_token(&body)) {
        return rejection;
    }
    if state.config.no_investments {
        return plaid_error(
            "ITEM_ERROR",
            "PRODUCTS_NOT_SUPPORTED",
            "the investments product is not enabled for this item",
        );
    }
    Json(json!({
        "holdings": [
            {
                "account_id": "acc-invest",
                "security_id": "sec-acme",
                "quantity": 1.5,
                "cost_basis": 120.0,
                "institution_value": 150.0,
                "institution_price": 100.0,
                "institution_price_as_of": "2025-01-15",
            },
        ],
        "securities": [
            {
                "security_id": "sec-acme",
                "name": "Acme Corp",
                "ticker_symbol": "ACME",
                "type": "equity",
                "close_price": 100.0,
                "close_price_as_of": "2025-01-15",
            },
        ],
        "request_id": "mock-request",
    }))
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let server = MockPlaidServer::start(MockConfig::default()).await.unwrap();
        assert!(server.port() > 0);
        assert!(server.base_url().starts_with("http://127.0.0.1:"));
    }
}
