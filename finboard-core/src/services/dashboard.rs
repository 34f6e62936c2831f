//! Dashboard service - presentation aggregates over a user's data

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::money;
use crate::domain::result::Result;
use crate::domain::{Account, HoldingView, Id, Transaction};
use crate::services::QueryService;

/// Category label for expenses without one
pub const OTHER_CATEGORY: &str = "Other";

/// Transactions shown in the recent list
pub const RECENT_TRANSACTIONS: usize = 5;

/// A labelled amount, in first-seen order of its label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedAmount {
    pub name: String,
    pub value: Decimal,
}

/// Everything the dashboard page renders
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub total_balance: Decimal,
    pub expenses_by_category: Vec<NamedAmount>,
    pub portfolio_value: Decimal,
    pub holdings_by_value: Vec<NamedAmount>,
    pub recent_transactions: Vec<Transaction>,
}

impl DashboardSummary {
    /// Compute the aggregates from already-scoped query results
    pub fn build(
        accounts: &[Account],
        transactions: &[Transaction],
        holdings: &[HoldingView],
    ) -> Self {
        let total_balance = money::money(accounts.iter().map(|a| a.balance).sum());

        let mut expenses = Totals::default();
        for tx in transactions.iter().filter(|tx| tx.is_expense()) {
            let category = tx
                .category
                .as_deref()
                .filter(|c| !c.is_empty())
                .unwrap_or(OTHER_CATEGORY);
            expenses.add(category, tx.amount.abs());
        }

        let portfolio_value = money::money(holdings.iter().map(|h| h.holding.value).sum());

        let mut by_holding = Totals::default();
        for view in holdings {
            by_holding.add(view.display_name(), view.holding.value);
        }

        Self {
            total_balance,
            expenses_by_category: expenses.finish(),
            portfolio_value,
            holdings_by_value: by_holding.finish(),
            recent_transactions: transactions
                .iter()
                .take(RECENT_TRANSACTIONS)
                .cloned()
                .collect(),
        }
    }
}

#[derive(Default)]
struct Totals(Vec<NamedAmount>);

impl Totals {
    fn add(&mut self, name: &str, value: Decimal) {
        match self.0.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.value += value,
            None => self.0.push(NamedAmount {
                name: name.to_string(),
                value,
            }),
        }
    }

    fn finish(self) -> Vec<NamedAmount> {
        self.0
            .into_iter()
            .map(|entry| NamedAmount {
                value: money::money(entry.value),
                ..entry
            })
            .collect()
    }
}

/// Dashboard service
pub struct DashboardService {
    query: Arc<QueryService>,
}

impl DashboardService {
    pub fn new(query: Arc<QueryService>) -> Self {
        Self { query }
    }

    pub async fn summary_for_user(&self, user_id: Id) -> Result<DashboardSummary> {
        let accounts = self.query.accounts_for_user(user_id).await?;
        let transactions = self.query.transactions_for_user(user_id).await?;
        let holdings = self.query.holdings_for_user(user_id).await?;
        Ok(DashboardSummary::build(&accounts, &transactions, &holdings))
    }
}
