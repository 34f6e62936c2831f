//! Query service - user-scoped reads over the replica tables

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{Account, HoldingView, Id, LinkedItem, Security, Transaction};
use crate::ports::Repository;

/// Query service for user-scoped reads
///
/// Every read follows user → linked items → accounts → rows, so a user
/// never sees another user's data.
pub struct QueryService {
    repository: Arc<dyn Repository>,
}

impl QueryService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    pub async fn linked_items_for_user(&self, user_id: Id) -> Result<Vec<LinkedItem>> {
        self.repository.get_linked_items_by_user(user_id).await
    }

    pub async fn accounts_for_user(&self, user_id: Id) -> Result<Vec<Account>> {
        self.repository.get_accounts_by_user(user_id).await
    }

    /// All of the user's transactions in insertion order
    pub async fn transactions_for_user(&self, user_id: Id) -> Result<Vec<Transaction>> {
        self.repository.get_transactions_by_user(user_id).await
    }

    /// All of the user's holdings joined with their securities
    pub async fn holdings_for_user(&self, user_id: Id) -> Result<Vec<HoldingView>> {
        let holdings = self.repository.get_holdings_by_user(user_id).await?;

        let mut securities: HashMap<String, Option<Security>> = HashMap::new();
        let mut views = Vec::with_capacity(holdings.len());
        for holding in holdings {
            if !securities.contains_key(&holding.security_id) {
                let security = self.repository.get_security(&holding.security_id).await?;
                securities.insert(holding.security_id.clone(), security);
            }
            let security = securities.get(&holding.security_id).and_then(Option::as_ref);
            views.push(HoldingView::join(holding, security));
        }
        Ok(views)
    }
}
