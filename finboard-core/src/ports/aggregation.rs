//! Account aggregation provider port
//!
//! Defines the interface for the upstream service that connects to banks
//! and brokerages (Plaid). Records returned here are the provider's view of
//! the world, in the provider's sign convention; the sync service maps them
//! into replica rows.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::result::Result;
use crate::domain::Id;

/// Short-lived token that scopes one consent flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkToken {
    pub link_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
}

/// Durable credentials obtained from a public token exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ItemCredentials {
    pub access_token: String,
    pub item_id: String,
}

/// Account as reported upstream
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalAccount {
    pub account_id: String,
    pub name: String,
    pub account_type: String,
    pub subtype: Option<String>,
    /// Current balance; `None` when upstream omits it
    pub current_balance: Option<Decimal>,
    pub iso_currency_code: Option<String>,
}

/// Transaction as reported upstream (outflows positive)
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub name: String,
    pub amount: Decimal,
    /// Category hierarchy, most general first
    pub category: Vec<String>,
    pub pending: bool,
}

/// Security as reported upstream
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalSecurity {
    pub security_id: String,
    pub name: String,
    pub ticker_symbol: Option<String>,
    pub security_type: String,
    pub close_price: Option<Decimal>,
    pub close_price_as_of: Option<NaiveDate>,
}

/// Holding as reported upstream
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalHolding {
    pub account_id: String,
    pub security_id: String,
    pub quantity: Decimal,
    pub cost_basis: Option<Decimal>,
    pub institution_value: Decimal,
    pub institution_price: Decimal,
    pub institution_price_as_of: Option<NaiveDate>,
}

/// Holdings report: positions plus the securities they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalHoldings {
    pub holdings: Vec<ExternalHolding>,
    pub securities: Vec<ExternalSecurity>,
}

/// Account aggregation provider
///
/// Implementations talk to the upstream API. The SyncService and LinkService
/// use this trait without knowing which provider is behind it, which is also
/// how tests substitute a fake.
#[async_trait]
pub trait AggregationProvider: Send + Sync {
    /// Provider name (e.g., "plaid")
    fn name(&self) -> &str;

    /// Create a link token for the consent flow of `user_id`
    async fn create_link_token(&self, user_id: Id) -> Result<LinkToken>;

    /// Exchange a one-time public token for durable credentials
    ///
    /// Not idempotent: upstream invalidates the public token on first use.
    async fn exchange_public_token(&self, public_token: &str) -> Result<ItemCredentials>;

    /// Look up the display name of an institution
    async fn get_institution_name(&self, institution_id: &str) -> Result<String>;

    /// Fetch the accounts of an item
    async fn get_accounts(&self, access_token: &str) -> Result<Vec<ExternalAccount>>;

    /// Fetch transactions of an item dated within `[start_date, end_date]`
    async fn get_transactions(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ExternalTransaction>>;

    /// Fetch investment holdings and their securities
    async fn get_holdings(&self, access_token: &str) -> Result<ExternalHoldings>;
}
