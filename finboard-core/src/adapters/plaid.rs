//! Plaid API client
//!
//! Handles communication with the Plaid API: link tokens, public token
//! exchange, institution lookup, and the three reports the sync routine
//! replicates (accounts, transactions, investment holdings).
//!
//! API Documentation: https://plaid.com/docs/api/

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::PlaidConfig;
use crate::domain::result::{Error, Result};
use crate::domain::Id;
use crate::ports::{
    AggregationProvider, ExternalAccount, ExternalHolding, ExternalHoldings, ExternalSecurity,
    ExternalTransaction, ItemCredentials, LinkToken,
};

pub const CLIENT_NAME: &str = "Finance Dashboard";
pub const COUNTRY_CODE: &str = "US";
pub const LANGUAGE: &str = "en";

/// Page size for /transactions/get
pub const TRANSACTIONS_PAGE_SIZE: usize = 500;

const REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// API Request Models
// =============================================================================

#[derive(Debug, Serialize)]
struct LinkTokenUser {
    client_user_id: String,
}

#[derive(Debug, Serialize)]
struct LinkTokenCreateRequest<'a> {
    user: LinkTokenUser,
    client_name: &'a str,
    products: Vec<&'a str>,
    country_codes: [&'a str; 1],
    language: &'a str,
}

#[derive(Debug, Serialize)]
struct PublicTokenExchangeRequest<'a> {
    public_token: &'a str,
}

#[derive(Debug, Serialize)]
struct InstitutionGetByIdRequest<'a> {
    institution_id: &'a str,
    country_codes: [&'a str; 1],
}

#[derive(Debug, Serialize)]
struct AccessTokenRequest<'a> {
    access_token: &'a str,
}

#[derive(Debug, Serialize)]
struct TransactionsGetRequest<'a> {
    access_token: &'a str,
    start_date: String,
    end_date: String,
    options: TransactionsGetOptions,
}

#[derive(Debug, Serialize)]
struct TransactionsGetOptions {
    count: usize,
    offset: usize,
}

// =============================================================================
// API Response Models (Plaid wire format)
// =============================================================================

/// Error body returned with every non-2xx response
#[derive(Debug, Clone, Deserialize)]
pub struct PlaidErrorBody {
    #[serde(default)]
    pub error_type: Option<String>,
    pub error_code: String,
    pub error_message: String,
}

#[derive(Debug, Deserialize)]
struct PublicTokenExchangeResponse {
    access_token: String,
    item_id: String,
}

#[derive(Debug, Deserialize)]
struct InstitutionGetByIdResponse {
    institution: PlaidInstitution,
}

#[derive(Debug, Deserialize)]
struct PlaidInstitution {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AccountsGetResponse {
    accounts: Vec<PlaidAccount>,
}

/// Plaid account from API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidAccount {
    pub account_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub balances: PlaidBalances,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidBalances {
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub current: Option<Decimal>,
    #[serde(default)]
    pub iso_currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionsGetResponse {
    transactions: Vec<PlaidTransaction>,
    total_transactions: usize,
}

/// Plaid transaction from API (outflows positive)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidTransaction {
    pub transaction_id: String,
    pub account_id: String,
    pub date: NaiveDate,
    pub name: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: Decimal,
    #[serde(default)]
    pub category: Option<Vec<String>>,
    #[serde(default)]
    pub pending: bool,
}

#[derive(Debug, Deserialize)]
struct HoldingsGetResponse {
    holdings: Vec<PlaidHolding>,
    securities: Vec<PlaidSecurity>,
}

/// Plaid investment holding from API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidHolding {
    pub account_id: String,
    pub security_id: String,
    #[serde(deserialize_with = "deserialize_amount")]
    pub quantity: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub cost_basis: Option<Decimal>,
    #[serde(deserialize_with = "deserialize_amount")]
    pub institution_value: Decimal,
    #[serde(deserialize_with = "deserialize_amount")]
    pub institution_price: Decimal,
    #[serde(default)]
    pub institution_price_as_of: Option<NaiveDate>,
}

/// Plaid security from API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaidSecurity {
    pub security_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ticker_symbol: Option<String>,
    #[serde(rename = "type", default)]
    pub security_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub close_price: Option<Decimal>,
    #[serde(default)]
    pub close_price_as_of: Option<NaiveDate>,
}

fn parse_decimal(value: JsonValue) -> std::result::Result<Option<Decimal>, String> {
    match value {
        JsonValue::Null => Ok(None),
        // Go through the textual form so 0.1 stays 0.1
        JsonValue::Number(n) => n
            .to_string()
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Some)
            .map_err(|e| format!("invalid decimal: {}", e)),
        JsonValue::String(s) => s
            .parse::<Decimal>()
            .map(Some)
            .map_err(|e| format!("invalid decimal: {}", e)),
        _ => Err("expected number or string for amount".to_string()),
    }
}

/// Deserialize amount that can be number or string
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: JsonValue = Deserialize::deserialize(deserializer)?;
    parse_decimal(value)
        .map_err(D::Error::custom)?
        .ok_or_else(|| D::Error::custom("amount must not be null"))
}

/// Deserialize optional amount; null means absent
fn deserialize_optional_amount<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    let value: Option<JsonValue> = Option::deserialize(deserializer)?;
    match value {
        Some(v) => parse_decimal(v).map_err(D::Error::custom),
        None => Ok(None),
    }
}

// =============================================================================
// Plaid HTTP Client
// =============================================================================

/// Plaid API client
pub struct PlaidClient {
    client: Client,
    config: PlaidConfig,
    base_url: String,
}

impl PlaidClient {
    /// Create a new Plaid client for the configured environment.
    ///
    /// Missing credentials are not an error here; every call reports them
    /// instead, so the server can start without Plaid configured.
    pub fn new(config: &PlaidConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Products requested for new link tokens
    pub fn products(&self) -> Vec<&'static str> {
        let mut products = vec!["transactions"];
        if self.config.enable_investments {
            products.push("investments");
        }
        products
    }

    /// POST a JSON body to an endpoint and decode the JSON answer
    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        if !self.config.has_credentials() {
            return Err(Error::Config(
                "Plaid credentials are not configured (PLAID_CLIENT_ID / PLAID_SECRET)"
                    .to_string(),
            ));
        }

        let url = format!("{}{}", self.base_url, path);
        debug!(endpoint = path, "plaid request");

        let response = self
            .client
            .post(&url)
            .header("PLAID-CLIENT-ID", &self.config.client_id)
            .header("PLAID-SECRET", &self.config.secret)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let response = self.check_response_status(response).await?;

        response
            .json::<T>()
            .await
            .map_err(|e| Error::upstream(format!("Failed to parse Plaid {} response: {}", path, e)))
    }

    /// Map request errors to user-friendly messages
    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::upstream(format!(
                "Connection timed out after {} seconds",
                REQUEST_TIMEOUT_SECS
            ))
        } else if error.is_connect() {
            Error::upstream("Unable to connect to Plaid servers")
        } else {
            Error::upstream(format!("Plaid request failed: {}", error))
        }
    }

    /// Check response status; non-2xx bodies are decoded as Plaid errors
    async fn check_response_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        if let Ok(body) = serde_json::from_str::<PlaidErrorBody>(&text) {
            return Err(Error::upstream(format!(
                "{}: {}",
                body.error_code, body.error_message
            )));
        }

        Err(match status.as_u16() {
            401 => Error::upstream(
                "Plaid authentication failed. Check PLAID_CLIENT_ID and PLAID_SECRET.",
            ),
            429 => Error::upstream(
                "Plaid rate limit exceeded. Please wait a moment and try again.",
            ),
            code => Error::upstream(format!("Plaid API error: HTTP {}", code)),
        })
    }

    fn map_account(account: PlaidAccount) -> ExternalAccount {
        ExternalAccount {
            account_id: account.account_id,
            name: account.name,
            account_type: account.account_type,
            subtype: account.subtype,
            current_balance: account.balances.current,
            iso_currency_code: account.balances.iso_currency_code,
        }
    }

    fn map_transaction(tx: PlaidTransaction) -> ExternalTransaction {
        ExternalTransaction {
            transaction_id: tx.transaction_id,
            account_id: tx.account_id,
            date: tx.date,
            name: tx.name,
            amount: tx.amount,
            category: tx.category.unwrap_or_default(),
            pending: tx.pending,
        }
    }

    fn map_holding(holding: PlaidHolding) -> ExternalHolding {
        ExternalHolding {
            account_id: holding.account_id,
            security_id: holding.security_id,
            quantity: holding.quantity,
            cost_basis: holding.cost_basis,
            institution_value: holding.institution_value,
            institution_price: holding.institution_price,
            institution_price_as_of: holding.institution_price_as_of,
        }
    }

    fn map_security(security: PlaidSecurity) -> ExternalSecurity {
        ExternalSecurity {
            security_id: security.security_id,
            name: security.name.unwrap_or_default(),
            ticker_symbol: security.ticker_symbol,
            security_type: security.security_type.unwrap_or_default(),
            close_price: security.close_price,
            close_price_as_of: security.close_price_as_of,
        }
    }
}

#[async_trait]
impl AggregationProvider for PlaidClient {
    fn name(&self) -> &str {
        "plaid"
    }

    async fn create_link_token(&self, user_id: Id) -> Result<LinkToken> {
        let request = LinkTokenCreateRequest {
            user: LinkTokenUser {
                client_user_id: user_id.to_string(),
            },
            client_name: CLIENT_NAME,
            products: self.products(),
            country_codes: [COUNTRY_CODE],
            language: LANGUAGE,
        };
        self.post("/link/token/create", &request).await
    }

    async fn exchange_public_token(&self, public_token: &str) -> Result<ItemCredentials> {
        let response: PublicTokenExchangeResponse = self
            .post(
                "/item/public_token/exchange",
                &PublicTokenExchangeRequest { public_token },
            )
            .await?;
        Ok(ItemCredentials {
            access_token: response.access_token,
            item_id: response.item_id,
        })
    }

    async fn get_institution_name(&self, institution_id: &str) -> Result<String> {
        let response: InstitutionGetByIdResponse = self
            .post(
                "/institutions/get_by_id",
                &InstitutionGetByIdRequest {
                    institution_id,
                    country_codes: [COUNTRY_CODE],
                },
            )
            .await?;
        Ok(response.institution.name)
    }

    async fn get_accounts(&self, access_token: &str) -> Result<Vec<ExternalAccount>> {
        let response: AccountsGetResponse = self
            .post("/accounts/get", &AccessTokenRequest { access_token })
            .await?;
        Ok(response.accounts.into_iter().map(Self::map_account).collect())
    }

    async fn get_transactions(
        &self,
        access_token: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<ExternalTransaction>> {
        let mut transactions = Vec::new();

        loop {
            let request = TransactionsGetRequest {
                access_token,
                start_date: start_date.format("%Y-%m-%d").to_string(),
                end_date: end_date.format("%Y-%m-%d").to_string(),
                options: TransactionsGetOptions {
                    count: TRANSACTIONS_PAGE_SIZE,
                    offset: transactions.len(),
                },
            };
            let page: TransactionsGetResponse = self.post("/transactions/get", &request).await?;
            let received = page.transactions.len();
            transactions.extend(page.transactions.into_iter().map(Self::map_transaction));

            if received == 0 || transactions.len() >= page.total_transactions {
                break;
            }
        }

        Ok(transactions)
    }

    async fn get_holdings(&self, access_token: &str) -> Result<ExternalHoldings> {
        let response: HoldingsGetResponse = self
            .post("/investments/holdings/get", &AccessTokenRequest { access_token })
            .await?;
        Ok(ExternalHoldings {
            holdings: response.holdings.into_iter().map(Self::map_holding).collect(),
            securities: response.securities.into_iter().map(Self::map_security).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::plaid_mock::{MockConfig, MockPlaidServer, MOCK_PUBLIC_TOKEN};
    use crate::config::PlaidEnvironment;

    fn config_for(base_url: &str) -> PlaidConfig {
        PlaidConfig {
            environment: PlaidEnvironment::Sandbox,
            client_id: "test_client".to_string(),
            secret: "test_secret".to_string(),
            base_url: Some(base_url.to_string()),
            enable_investments: true,
        }
    }

    async fn client_with(mock: MockConfig) -> (MockPlaidServer, PlaidClient) {
        let server = MockPlaidServer::start(mock).await.unwrap();
        let client = PlaidClient::new(&config_for(&server.base_url())).unwrap();
        (server, client)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_deserialize_transaction_amount_precision() {
        let json = r#"{
            "transaction_id": "tx-1",
            "account_id": "acc-1",
            "date": "2025-01-10",
            "name": "Coffee",
            "amount": 4.1,
            "category": ["Food and Drink", "Coffee Shop"],
            "pending": false
        }"#;
        let tx: PlaidTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.amount, Decimal::new(41, 1));
        assert_eq!(tx.category.as_ref().unwrap()[0], "Food and Drink");
    }

    #[test]
    fn test_deserialize_account_missing_balance_fields() {
        let json = r#"{
            "account_id": "acc-1",
            "name": "Plaid Checking",
            "type": "depository",
            "subtype": null,
            "balances": { "current": null }
        }"#;
        let account: PlaidAccount = serde_json::from_str(json).unwrap();
        assert_eq!(account.balances.current, None);
        assert_eq!(account.balances.iso_currency_code, None);
        assert_eq!(account.subtype, None);
    }

    #[test]
    fn test_deserialize_security_with_nulls() {
        let json = r#"{
            "security_id": "sec-1",
            "name": "Cash",
            "ticker_symbol": null,
            "type": "cash",
            "close_price": 1,
            "close_price_as_of": null
        }"#;
        let security: PlaidSecurity = serde_json::from_str(json).unwrap();
        assert_eq!(security.close_price, Some(Decimal::ONE));
        assert_eq!(security.ticker_symbol, None);
    }

    #[test]
    fn test_products_follow_config() {
        let mut config = config_for("http://127.0.0.1:1");
        config.enable_investments = false;
        let client = PlaidClient::new(&config).unwrap();
        assert_eq!(client.products(), vec!["transactions"]);

        config.enable_investments = true;
        let client = PlaidClient::new(&config).unwrap();
        assert_eq!(client.products(), vec!["transactions", "investments"]);
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected_before_request() {
        let client = PlaidClient::new(&PlaidConfig::default()).unwrap();
        let err = client.get_accounts("access").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_link_token_and_exchange() {
        let (_server, client) = client_with(MockConfig::default()).await;

        let token = client.create_link_token(7).await.unwrap();
        assert!(token.link_token.starts_with("link-sandbox-"));

        let creds = client.exchange_public_token(MOCK_PUBLIC_TOKEN).await.unwrap();
        assert!(creds.access_token.starts_with("access-sandbox-"));
        assert!(!creds.item_id.is_empty());

        let name = client.get_institution_name("ins_109508").await.unwrap();
        assert_eq!(name, "First Platypus Bank");
    }

    #[tokio::test]
    async fn test_exchange_invalid_public_token() {
        let (_server, client) = client_with(MockConfig::default()).await;
        let err = client.exchange_public_token("public-bogus").await.unwrap_err();
        match err {
            Error::Upstream(msg) => assert!(msg.starts_with("INVALID_PUBLIC_TOKEN")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accounts_and_transactions() {
        let (_server, client) = client_with(MockConfig::default()).await;

        let accounts = client.get_accounts("access-sandbox-1").await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].current_balance, Some(Decimal::new(1000, 0)));
        assert_eq!(accounts[0].iso_currency_code.as_deref(), Some("USD"));

        let txs = client
            .get_transactions("access-sandbox-1", date("2025-01-01"), date("2025-01-31"))
            .await
            .unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].amount, Decimal::new(50, 0));
        assert_eq!(txs[1].amount, Decimal::new(-20, 0));
        assert!(txs[1].category.is_empty());
    }

    #[tokio::test]
    async fn test_transactions_paginate() {
        let (_server, client) = client_with(MockConfig {
            num_extra_transactions: TRANSACTIONS_PAGE_SIZE + 3,
            ..MockConfig::default()
        })
        .await;

        let txs = client
            .get_transactions("access-sandbox-1", date("2025-01-01"), date("2025-01-31"))
            .await
            .unwrap();
        assert_eq!(txs.len(), TRANSACTIONS_PAGE_SIZE + 5);
    }

    #[tokio::test]
    async fn test_holdings() {
        let (_server, client) = client_with(MockConfig::default()).await;
        let report = client.get_holdings("access-sandbox-1").await.unwrap();
        assert_eq!(report.holdings.len(), 1);
        assert_eq!(report.securities.len(), 1);
        assert_eq!(report.holdings[0].quantity, Decimal::new(15, 1));
        assert_eq!(report.securities[0].ticker_symbol.as_deref(), Some("ACME"));
    }

    #[tokio::test]
    async fn test_holdings_product_not_enabled() {
        let (_server, client) = client_with(MockConfig {
            no_investments: true,
            ..MockConfig::default()
        })
        .await;
        let err = client.get_holdings("access-sandbox-1").await.unwrap_err();
        match err {
            Error::Upstream(msg) => assert!(msg.contains("PRODUCTS_NOT_SUPPORTED")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let (_server, client) = client_with(MockConfig {
            fail_auth: true,
            ..MockConfig::default()
        })
        .await;
        let err = client.get_accounts("access-sandbox-1").await.unwrap_err();
        match err {
            Error::Upstream(msg) => assert!(msg.starts_with("INVALID_API_KEYS")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_without_error_body() {
        let (_server, client) = client_with(MockConfig {
            rate_limit: true,
            ..MockConfig::default()
        })
        .await;
        let err = client.get_accounts("access-sandbox-1").await.unwrap_err();
        match err {
            Error::Upstream(msg) => assert!(msg.contains("rate limit")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = PlaidClient::new(&config_for(&format!("http://127.0.0.1:{}", port))).unwrap();
        let err = client.get_accounts("access").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }
}
