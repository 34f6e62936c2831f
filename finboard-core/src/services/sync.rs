//! Sync service - replicate upstream accounts, holdings and transactions

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SyncMode;
use crate::domain::money;
use crate::domain::result::Result;
use crate::domain::{
    Account, Holding, Id, LinkedItem, NewAccount, NewHolding, NewSecurity, NewTransaction,
    Security, Transaction,
};
use crate::ports::{
    AggregationProvider, ExternalAccount, ExternalHolding, ExternalSecurity, ExternalTransaction,
    Repository,
};

/// Days of transaction history fetched on every sync
pub const SYNC_WINDOW_DAYS: i64 = 30;

/// Currency assumed when upstream omits one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Outcome of syncing one linked item
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub linked_item_id: Id,
    pub institution_name: String,
    pub accounts: usize,
    pub transactions: usize,
    pub securities: usize,
    pub holdings: usize,
    /// Upstream accounts rejected by validation
    pub dropped_accounts: usize,
    /// Transactions whose account could not be resolved
    pub dropped_transactions: usize,
    /// Holdings whose account could not be resolved
    pub dropped_holdings: usize,
    /// Set when the holdings fetch failed and was skipped
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holdings_warning: Option<String>,
    /// Set when the sync aborted; counts are then zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl SyncReport {
    fn empty(item: &LinkedItem, (start_date, end_date): (NaiveDate, NaiveDate)) -> Self {
        Self {
            linked_item_id: item.id,
            institution_name: item.institution_name.clone(),
            accounts: 0,
            transactions: 0,
            securities: 0,
            holdings: 0,
            dropped_accounts: 0,
            dropped_transactions: 0,
            dropped_holdings: 0,
            holdings_warning: None,
            error: None,
            start_date,
            end_date,
        }
    }
}

/// Sync service for replica tables
pub struct SyncService {
    repository: Arc<dyn Repository>,
    provider: Arc<dyn AggregationProvider>,
    mode: SyncMode,
}

impl SyncService {
    pub fn new(
        repository: Arc<dyn Repository>,
        provider: Arc<dyn AggregationProvider>,
        mode: SyncMode,
    ) -> Self {
        Self {
            repository,
            provider,
            mode,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Transaction window ending today: `[today - 30 days, today]`
    pub fn window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - Duration::days(SYNC_WINDOW_DAYS), today)
    }

    /// Sync every linked item of a user, in item order
    ///
    /// A failing item does not stop the others: its report carries the
    /// error instead.
    pub async fn sync_user(&self, user_id: Id) -> Result<Vec<SyncReport>> {
        let items = self.repository.get_linked_items_by_user(user_id).await?;
        let mut reports = Vec::with_capacity(items.len());
        for item in &items {
            let report = match self.sync_item(item).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(linked_item = item.id, error = %e, "sync failed");
                    let mut report =
                        SyncReport::empty(item, Self::window(Utc::now().date_naive()));
                    report.error = Some(e.to_string());
                    report
                }
            };
            reports.push(report);
        }
        Ok(reports)
    }

    /// Fetch upstream state for one linked item and write it locally
    ///
    /// Accounts and transactions failures abort the sync; whatever was
    /// written before the failure stays. Holdings failures are logged and
    /// recorded in the report.
    pub async fn sync_item(&self, item: &LinkedItem) -> Result<SyncReport> {
        let (start_date, end_date) = Self::window(Utc::now().date_naive());
        let mut report = SyncReport::empty(item, (start_date, end_date));

        // Accounts
        let external_accounts = self.provider.get_accounts(&item.access_token).await?;
        for external in external_accounts {
            let account = map_account(item.id, external);
            if let Err(reason) = account.validate() {
                debug!(linked_item = item.id, reason, "dropping invalid account");
                report.dropped_accounts += 1;
                continue;
            }
            self.write_account(account).await?;
            report.accounts += 1;
        }
        info!(
            linked_item = item.id,
            accounts = report.accounts,
            dropped = report.dropped_accounts,
            mode = ?self.mode,
            "synced accounts"
        );

        let mut resolver = AccountResolver::new(item.id);

        // Holdings are optional: items without the investments product fail here
        match self.provider.get_holdings(&item.access_token).await {
            Ok(holdings) => {
                for external in holdings.securities {
                    self.write_security(map_security(external)).await?;
                    report.securities += 1;
                }
                for external in holdings.holdings {
                    let Some(account_id) = resolver
                        .resolve(self.repository.as_ref(), &external.account_id)
                        .await?
                    else {
                        debug!(
                            linked_item = item.id,
                            security = %external.security_id,
                            "dropping holding with unknown account"
                        );
                        report.dropped_holdings += 1;
                        continue;
                    };
                    self.write_holding(map_holding(account_id, external, end_date))
                        .await?;
                    report.holdings += 1;
                }
                info!(
                    linked_item = item.id,
                    securities = report.securities,
                    holdings = report.holdings,
                    dropped = report.dropped_holdings,
                    "synced holdings"
                );
            }
            Err(e) => {
                warn!(linked_item = item.id, error = %e, "skipping holdings");
                report.holdings_warning = Some(e.to_string());
            }
        }

        // Transactions
        let external_transactions = self
            .provider
            .get_transactions(&item.access_token, start_date, end_date)
            .await?;
        for external in external_transactions {
            let Some(account_id) = resolver
                .resolve(self.repository.as_ref(), &external.account_id)
                .await?
            else {
                debug!(
                    linked_item = item.id,
                    transaction = %external.transaction_id,
                    "dropping transaction with unknown account"
                );
                report.dropped_transactions += 1;
                continue;
            };
            self.write_transaction(map_transaction(account_id, external))
                .await?;
            report.transactions += 1;
        }
        info!(
            linked_item = item.id,
            transactions = report.transactions,
            dropped = report.dropped_transactions,
            start = %start_date,
            end = %end_date,
            "synced transactions"
        );

        self.repository.touch_last_sync(item.id).await?;
        Ok(report)
    }

    async fn write_account(&self, account: NewAccount) -> Result<Account> {
        match self.mode {
            SyncMode::Append => self.repository.insert_account(account).await,
            SyncMode::Upsert => self.repository.upsert_account(account).await,
        }
    }

    async fn write_security(&self, security: NewSecurity) -> Result<Security> {
        match self.mode {
            SyncMode::Append => self.repository.insert_security(security).await,
            SyncMode::Upsert => self.repository.upsert_security(security).await,
        }
    }

    async fn write_holding(&self, holding: NewHolding) -> Result<Holding> {
        match self.mode {
            SyncMode::Append => self.repository.insert_holding(holding).await,
            SyncMode::Upsert => self.repository.upsert_holding(holding).await,
        }
    }

    async fn write_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        match self.mode {
            SyncMode::Append => self.repository.insert_transaction(tx).await,
            SyncMode::Upsert => self.repository.upsert_transaction(tx).await,
        }
    }
}

/// Resolves upstream account ids to local ids within one linked item
///
/// Lookups are cached for the duration of a sync.
struct AccountResolver {
    linked_item_id: Id,
    cache: HashMap<String, Option<Id>>,
}

impl AccountResolver {
    fn new(linked_item_id: Id) -> Self {
        Self {
            linked_item_id,
            cache: HashMap::new(),
        }
    }

    async fn resolve(
        &mut self,
        repository: &dyn Repository,
        external_account_id: &str,
    ) -> Result<Option<Id>> {
        if let Some(cached) = self.cache.get(external_account_id) {
            return Ok(*cached);
        }
        let resolved = repository
            .get_account_by_external_id(self.linked_item_id, external_account_id)
            .await?
            .map(|account| account.id);
        self.cache.insert(external_account_id.to_string(), resolved);
        Ok(resolved)
    }
}

fn map_account(linked_item_id: Id, external: ExternalAccount) -> NewAccount {
    let currency = external
        .iso_currency_code
        .as_deref()
        .map(Account::normalize_currency)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    NewAccount {
        linked_item_id,
        external_account_id: external.account_id,
        name: external.name,
        account_type: external.account_type,
        subtype: external.subtype,
        balance: money::money(external.current_balance.unwrap_or_default()),
        iso_currency_code: currency,
    }
}

fn map_transaction(account_id: Id, external: ExternalTransaction) -> NewTransaction {
    NewTransaction {
        account_id,
        external_transaction_id: external.transaction_id,
        date: external.date,
        name: external.name,
        amount: money::money(Transaction::amount_from_upstream(external.amount)),
        category: external.category.into_iter().next(),
        pending: external.pending,
    }
}

fn map_security(external: ExternalSecurity) -> NewSecurity {
    NewSecurity {
        security_id: external.security_id,
        name: external.name,
        ticker_symbol: external.ticker_symbol,
        security_type: external.security_type,
        close_price: external.close_price.map(money::money),
        update_date: external.close_price_as_of,
    }
}

fn map_holding(account_id: Id, external: ExternalHolding, today: NaiveDate) -> NewHolding {
    NewHolding {
        account_id,
        security_id: external.security_id,
        quantity: money::quantity(external.quantity),
        cost_basis: external.cost_basis.map(money::money),
        value: money::money(external.institution_value),
        last_price: money::money(external.institution_price),
        price_as_of: external.institution_price_as_of.unwrap_or(today),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_window_is_thirty_days() {
        let (start, end) = SyncService::window(date("2025-03-15"));
        assert_eq!(start, date("2025-02-13"));
        assert_eq!(end, date("2025-03-15"));
    }

    #[test]
    fn test_map_account_defaults() {
        let account = map_account(
            3,
            ExternalAccount {
                account_id: "acc-1".to_string(),
                name: "Brokerage".to_string(),
                account_type: "investment".to_string(),
                subtype: None,
                current_balance: None,
                iso_currency_code: None,
            },
        );
        assert_eq!(account.linked_item_id, 3);
        assert_eq!(account.balance.to_string(), "0.00");
        assert_eq!(account.iso_currency_code, "USD");
    }

    #[test]
    fn test_map_account_normalizes_currency_and_scale() {
        let account = map_account(
            1,
            ExternalAccount {
                account_id: "acc-1".to_string(),
                name: "Checking".to_string(),
                account_type: "depository".to_string(),
                subtype: Some("checking".to_string()),
                current_balance: Some(Decimal::new(10005, 1)),
                iso_currency_code: Some("eur".to_string()),
            },
        );
        assert_eq!(account.balance.to_string(), "1000.50");
        assert_eq!(account.iso_currency_code, "EUR");
    }

    #[test]
    fn test_map_transaction_inverts_sign_and_takes_first_category() {
        let tx = map_transaction(
            9,
            ExternalTransaction {
                transaction_id: "tx-1".to_string(),
                account_id: "acc-1".to_string(),
                date: date("2025-01-10"),
                name: "Coffee".to_string(),
                amount: Decimal::new(425, 2),
                category: vec!["Food and Drink".to_string(), "Coffee Shop".to_string()],
                pending: true,
            },
        );
        assert_eq!(tx.amount.to_string(), "-4.25");
        assert_eq!(tx.category.as_deref(), Some("Food and Drink"));
        assert!(tx.pending);
    }

    #[test]
    fn test_map_holding_falls_back_to_today() {
        let holding = map_holding(
            2,
            ExternalHolding {
                account_id: "acc-1".to_string(),
                security_id: "sec-1".to_string(),
                quantity: Decimal::new(1_500_000, 6),
                cost_basis: None,
                institution_value: Decimal::new(150, 0),
                institution_price: Decimal::new(100, 0),
                institution_price_as_of: None,
            },
            date("2025-02-01"),
        );
        assert_eq!(holding.quantity.to_string(), "1.5");
        assert_eq!(holding.value.to_string(), "150.00");
        assert_eq!(holding.last_price.to_string(), "100.00");
        assert_eq!(holding.price_as_of, date("2025-02-01"));
    }
}
