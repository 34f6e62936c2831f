//! Shared helpers for finboard-core integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use finboard_core::adapters::duckdb::DuckDbRepository;
use finboard_core::adapters::memory::MemoryRepository;
use finboard_core::config::{Config, SyncMode};
use finboard_core::ports::{
    AggregationProvider, ExternalAccount, ExternalHolding, ExternalHoldings, ExternalSecurity,
    ExternalTransaction, ItemCredentials, LinkToken, Repository,
};
use finboard_core::services::PasswordParams;
use finboard_core::{Error, FinboardContext, Id, Result};

// ============================================================================
// Test Helpers
// ============================================================================

/// Upstream data served by the fake provider
#[derive(Clone, Default)]
pub struct FakeData {
    pub accounts: Vec<ExternalAccount>,
    pub transactions: Vec<ExternalTransaction>,
    /// `None` simulates an item without the investments product
    pub holdings: Option<ExternalHoldings>,
    pub fail_transactions: bool,
    /// Access tokens whose accounts request fails
    pub failing_tokens: Vec<String>,
}

/// Trait-level fake of the upstream aggregation API
pub struct FakeProvider {
    data: Mutex<FakeData>,
    exchanges: AtomicUsize,
}

impl FakeProvider {
    pub fn new(data: FakeData) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data),
            exchanges: AtomicUsize::new(0),
        })
    }

    pub fn data(&self) -> FakeData {
        self.data.lock().unwrap().clone()
    }

    pub fn update(&self, change: impl FnOnce(&mut FakeData)) {
        let mut data = self.data.lock().unwrap();
        change(&mut *data);
    }
}

#[async_trait]
impl AggregationProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create_link_token(&self, user_id: Id) -> Result<LinkToken> {
        Ok(LinkToken {
            link_token: format!("link-fake-{}", user_id),
            expiration: None,
        })
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<ItemCredentials> {
        if !public_token.starts_with("public-") {
            return Err(Error::upstream("INVALID_PUBLIC_TOKEN: bad token"));
        }
        let n = self.exchanges.fetch_add(1, Ordering::SeqCst);
        Ok(ItemCredentials {
            access_token: format!("access-fake-{}", n),
            item_id: format!("item-{}", n),
        })
    }

    async fn get_institution_name(&self, institution_id: &str) -> Result<String> {
        Ok(format!("Fake Bank {}", institution_id))
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<ExternalAccount>> {
        let data = self.data();
        if data.failing_tokens.iter().any(|t| t == access_token) {
            return Err(Error::upstream("ITEM_LOGIN_REQUIRED: login details changed"));
        }
        Ok(data.accounts)
    }

    async fn get_transactions(
        &self,
        _access_token: &str,
        _start_date: NaiveDate,
        _end_date: NaiveDate,
    ) -> Result<Vec<ExternalTransaction>> {
        let data = self.data();
        if data.fail_transactions {
            return Err(Error::upstream("PRODUCT_NOT_READY: transactions not ready"));
        }
        Ok(data.transactions)
    }

    async fn get_holdings(&self, _access_token: &str) -> Result<ExternalHoldings> {
        self.data()
            .holdings
            .ok_or_else(|| Error::upstream("PRODUCTS_NOT_SUPPORTED: investments not enabled"))
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn checking(balance: i64) -> ExternalAccount {
    ExternalAccount {
        account_id: "acc-1".to_string(),
        name: "Plaid Checking".to_string(),
        account_type: "depository".to_string(),
        subtype: Some("checking".to_string()),
        current_balance: Some(Decimal::new(balance, 0)),
        iso_currency_code: Some("USD".to_string()),
    }
}

pub fn upstream_tx(
    id: &str,
    account_id: &str,
    amount: i64,
    category: Option<&str>,
) -> ExternalTransaction {
    ExternalTransaction {
        transaction_id: id.to_string(),
        account_id: account_id.to_string(),
        date: date("2025-01-10"),
        name: format!("Transaction {}", id),
        amount: Decimal::new(amount, 0),
        category: category.map(|c| vec![c.to_string()]).unwrap_or_default(),
        pending: false,
    }
}

pub fn acme_holdings() -> ExternalHoldings {
    ExternalHoldings {
        holdings: vec![ExternalHolding {
            account_id: "acc-1".to_string(),
            security_id: "sec-acme".to_string(),
            quantity: Decimal::new(15, 1),
            cost_basis: Some(Decimal::new(120, 0)),
            institution_value: Decimal::new(150, 0),
            institution_price: Decimal::new(100, 0),
            institution_price_as_of: Some(date("2025-01-15")),
        }],
        securities: vec![ExternalSecurity {
            security_id: "sec-acme".to_string(),
            name: "Acme Corp".to_string(),
            ticker_symbol: Some("ACME".to_string()),
            security_type: "equity".to_string(),
            close_price: Some(Decimal::new(100, 0)),
            close_price_as_of: Some(date("2025-01-15")),
        }],
    }
}

/// One account with 1000 USD and two transactions (+50 and -20 upstream)
pub fn scenario() -> FakeData {
    FakeData {
        accounts: vec![checking(1000)],
        transactions: vec![
            upstream_tx("tx-1", "acc-1", 50, Some("Food and Drink")),
            upstream_tx("tx-2", "acc-1", -20, None),
        ],
        holdings: Some(acme_holdings()),
        fail_transactions: false,
        failing_tokens: Vec::new(),
    }
}

pub fn stores() -> Vec<(&'static str, Arc<dyn Repository>)> {
    let duckdb = DuckDbRepository::in_memory().expect("Failed to open DuckDB");
    duckdb.ensure_schema().expect("Failed to initialize schema");
    let memory: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let duckdb: Arc<dyn Repository> = Arc::new(duckdb);
    vec![("memory", memory), ("duckdb", duckdb)]
}

pub fn context(
    repository: Arc<dyn Repository>,
    provider: Arc<FakeProvider>,
    mode: SyncMode,
) -> FinboardContext {
    let config = Config {
        sync_mode: mode,
        ..Config::default()
    };
    FinboardContext::with_password_params(
        config,
        repository,
        provider,
        PasswordParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        },
    )
}

pub async fn register(ctx: &FinboardContext, username: &str) -> Id {
    let (user, _) = ctx.auth_service.register(username, "password").await.unwrap();
    user.id
}

pub fn json<T: serde::Serialize>(value: &T) -> JsonValue {
    serde_json::to_value(value).unwrap()
}
