//! Repository port - store abstraction

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{
    Account, Holding, Id, LinkedItem, NewAccount, NewHolding, NewLinkedItem, NewSecurity,
    NewTransaction, NewUser, Security, Transaction, User,
};

/// Store abstraction for users, linked items and replica tables
///
/// `insert_*` always creates a new row. `upsert_*` matches an existing row
/// by its external key and updates it in place, creating it only when no
/// match exists:
/// - account: `(linked_item_id, external_account_id)`
/// - transaction: `(account_id, external_transaction_id)`
/// - security: `security_id`
/// - holding: `(account_id, security_id)`
///
/// User-scoped reads traverse user → linked item → account and return rows
/// in insertion order.
#[async_trait]
pub trait Repository: Send + Sync {
    // === Users ===

    /// Create a user; fails with `Error::Conflict` if the username is taken
    async fn create_user(&self, user: NewUser) -> Result<User>;

    async fn get_user(&self, id: Id) -> Result<Option<User>>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;

    // === Linked items ===

    async fn create_linked_item(&self, item: NewLinkedItem) -> Result<LinkedItem>;

    async fn get_linked_item(&self, id: Id) -> Result<Option<LinkedItem>>;

    async fn get_linked_items_by_user(&self, user_id: Id) -> Result<Vec<LinkedItem>>;

    /// Record a completed sync; returns the updated item
    async fn touch_last_sync(&self, id: Id) -> Result<LinkedItem>;

    // === Accounts ===

    async fn insert_account(&self, account: NewAccount) -> Result<Account>;

    async fn upsert_account(&self, account: NewAccount) -> Result<Account>;

    /// Find an account by upstream id among the accounts of one linked item
    async fn get_account_by_external_id(
        &self,
        linked_item_id: Id,
        external_account_id: &str,
    ) -> Result<Option<Account>>;

    async fn get_accounts_by_user(&self, user_id: Id) -> Result<Vec<Account>>;

    // === Transactions ===

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction>;

    async fn upsert_transaction(&self, tx: NewTransaction) -> Result<Transaction>;

    async fn get_transactions_by_user(&self, user_id: Id) -> Result<Vec<Transaction>>;

    // === Securities ===

    async fn insert_security(&self, security: NewSecurity) -> Result<Security>;

    async fn upsert_security(&self, security: NewSecurity) -> Result<Security>;

    /// First security stored under an upstream security id
    async fn get_security(&self, security_id: &str) -> Result<Option<Security>>;

    // === Holdings ===

    async fn insert_holding(&self, holding: NewHolding) -> Result<Holding>;

    async fn upsert_holding(&self, holding: NewHolding) -> Result<Holding>;

    async fn get_holdings_by_user(&self, user_id: Id) -> Result<Vec<Holding>>;

    // === Maintenance ===

    /// Row counts per table, for diagnostics and tests
    async fn table_counts(&self) -> Result<TableCounts>;
}

/// Number of rows in each table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct TableCounts {
    pub users: usize,
    pub linked_items: usize,
    pub accounts: usize,
    pub transactions: usize,
    pub securities: usize,
    pub holdings: usize,
}
