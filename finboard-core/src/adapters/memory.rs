//! In-memory repository implementation
//!
//! Process-local and non-durable: everything is lost on restart. Rows live
//! in id-ordered maps, with foreign-key indexes so user-scoped reads walk
//! user → items → accounts → rows instead of scanning whole tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, Holding, Id, LinkedItem, NewAccount, NewHolding, NewLinkedItem, NewSecurity,
    NewTransaction, NewUser, Security, Transaction, User,
};
use crate::ports::{Repository, TableCounts};

/// Id-ordered rows plus the id sequence of one table
struct Table<T> {
    rows: BTreeMap<Id, T>,
    next_id: Id,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Table<T> {
    fn insert_with(&mut self, build: impl FnOnce(Id) -> T) -> (Id, T) {
        let id = self.next_id;
        self.next_id += 1;
        let row = build(id);
        self.rows.insert(id, row.clone());
        (id, row)
    }

    fn collect(&self, ids: &[Id]) -> Vec<T> {
        ids.iter().filter_map(|id| self.rows.get(id).cloned()).collect()
    }
}

#[derive(Default)]
struct Tables {
    users: Table<User>,
    linked_items: Table<LinkedItem>,
    accounts: Table<Account>,
    transactions: Table<Transaction>,
    securities: Table<Security>,
    holdings: Table<Holding>,

    // Foreign-key indexes, ids kept in insertion order
    user_by_name: HashMap<String, Id>,
    items_by_user: HashMap<Id, Vec<Id>>,
    accounts_by_item: HashMap<Id, Vec<Id>>,
    transactions_by_account: HashMap<Id, Vec<Id>>,
    holdings_by_account: HashMap<Id, Vec<Id>>,
    securities_by_external: HashMap<String, Vec<Id>>,
}

impl Tables {
    fn account_ids_for_user(&self, user_id: Id) -> Vec<Id> {
        self.items_by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .flat_map(|item_id| self.accounts_by_item.get(item_id).into_iter().flatten())
            .copied()
            .collect()
    }

    /// Ids of rows reachable from `account_ids`, in insertion order
    fn child_ids(index: &HashMap<Id, Vec<Id>>, account_ids: &[Id]) -> Vec<Id> {
        let mut ids: Vec<Id> = account_ids
            .iter()
            .flat_map(|account_id| index.get(account_id).into_iter().flatten())
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    fn find_account(&self, linked_item_id: Id, external_account_id: &str) -> Option<&Account> {
        self.accounts_by_item
            .get(&linked_item_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.accounts.rows.get(id))
            .find(|a| a.external_account_id == external_account_id)
    }

    fn find_transaction_id(&self, account_id: Id, external_transaction_id: &str) -> Option<Id> {
        self.transactions_by_account
            .get(&account_id)
            .into_iter()
            .flatten()
            .copied()
            .find(|id| {
                self.transactions
                    .rows
                    .get(id)
                    .is_some_and(|t| t.external_transaction_id == external_transaction_id)
            })
    }

    fn find_holding_id(&self, account_id: Id, security_id: &str) -> Option<Id> {
        self.holdings_by_account
            .get(&account_id)
            .into_iter()
            .flatten()
            .copied()
            .find(|id| {
                self.holdings
                    .rows
                    .get(id)
                    .is_some_and(|h| h.security_id == security_id)
            })
    }

    fn insert_account(&mut self, account: NewAccount) -> Account {
        let linked_item_id = account.linked_item_id;
        let (id, row) = self.accounts.insert_with(|id| account.with_id(id));
        self.accounts_by_item.entry(linked_item_id).or_default().push(id);
        row
    }

    fn insert_transaction(&mut self, tx: NewTransaction) -> Transaction {
        let account_id = tx.account_id;
        let (id, row) = self.transactions.insert_with(|id| tx.with_id(id));
        self.transactions_by_account.entry(account_id).or_default().push(id);
        row
    }

    fn insert_security(&mut self, security: NewSecurity) -> Security {
        let external = security.security_id.clone();
        let (id, row) = self.securities.insert_with(|id| security.with_id(id));
        self.securities_by_external.entry(external).or_default().push(id);
        row
    }

    fn insert_holding(&mut self, holding: NewHolding) -> Holding {
        let account_id = holding.account_id;
        let (id, row) = self.holdings.insert_with(|id| holding.with_id(id));
        self.holdings_by_account.entry(account_id).or_default().push(id);
        row
    }

    fn ensure_linked_item(&self, id: Id) -> Result<()> {
        if self.linked_items.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::not_found(format!("linked item {}", id)))
        }
    }

    fn ensure_account(&self, id: Id) -> Result<()> {
        if self.accounts.rows.contains_key(&id) {
            Ok(())
        } else {
            Err(Error::not_found(format!("account {}", id)))
        }
    }
}

/// In-memory repository
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut t = self.tables()?;
        if t.user_by_name.contains_key(&user.username) {
            return Err(Error::conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        let username = user.username.clone();
        let (id, row) = t.users.insert_with(|id| user.with_id(id));
        t.user_by_name.insert(username, id);
        Ok(row)
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.tables()?.users.rows.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let t = self.tables()?;
        Ok(t.user_by_name
            .get(username)
            .and_then(|id| t.users.rows.get(id))
            .cloned())
    }

    async fn create_linked_item(&self, item: NewLinkedItem) -> Result<LinkedItem> {
        let mut t = self.tables()?;
        if !t.users.rows.contains_key(&item.user_id) {
            return Err(Error::not_found(format!("user {}", item.user_id)));
        }
        let user_id = item.user_id;
        let (id, row) = t.linked_items.insert_with(|id| item.with_id(id));
        t.items_by_user.entry(user_id).or_default().push(id);
        Ok(row)
    }

    async fn get_linked_item(&self, id: Id) -> Result<Option<LinkedItem>> {
        Ok(self.tables()?.linked_items.rows.get(&id).cloned())
    }

    async fn get_linked_items_by_user(&self, user_id: Id) -> Result<Vec<LinkedItem>> {
        let t = self.tables()?;
        let ids = t.items_by_user.get(&user_id).cloned().unwrap_or_default();
        Ok(t.linked_items.collect(&ids))
    }

    async fn touch_last_sync(&self, id: Id) -> Result<LinkedItem> {
        let mut t = self.tables()?;
        let item = t
            .linked_items
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("linked item {}", id)))?;
        item.last_sync = Some(Utc::now());
        Ok(item.clone())
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account> {
        let mut t = self.tables()?;
        t.ensure_linked_item(account.linked_item_id)?;
        Ok(t.insert_account(account))
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<Account> {
        let mut t = self.tables()?;
        t.ensure_linked_item(account.linked_item_id)?;
        let existing = t
            .find_account(account.linked_item_id, &account.external_account_id)
            .map(|a| a.id);
        match existing {
            Some(id) => {
                let row = account.with_id(id);
                t.accounts.rows.insert(id, row.clone());
                Ok(row)
            }
            None => Ok(t.insert_account(account)),
        }
    }

    async fn get_account_by_external_id(
        &self,
        linked_item_id: Id,
        external_account_id: &str,
    ) -> Result<Option<Account>> {
        let t = self.tables()?;
        Ok(t.find_account(linked_item_id, external_account_id).cloned())
    }

    async fn get_accounts_by_user(&self, user_id: Id) -> Result<Vec<Account>> {
        let t = self.tables()?;
        let mut ids = t.account_ids_for_user(user_id);
        ids.sort_unstable();
        Ok(t.accounts.collect(&ids))
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let mut t = self.tables()?;
        t.ensure_account(tx.account_id)?;
        Ok(t.insert_transaction(tx))
    }

    async fn upsert_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let mut t = self.tables()?;
        t.ensure_account(tx.account_id)?;
        match t.find_transaction_id(tx.account_id, &tx.external_transaction_id) {
            Some(id) => {
                let row = tx.with_id(id);
                t.transactions.rows.insert(id, row.clone());
                Ok(row)
            }
            None => Ok(t.insert_transaction(tx)),
        }
    }

    async fn get_transactions_by_user(&self, user_id: Id) -> Result<Vec<Transaction>> {
        let t = self.tables()?;
        let account_ids = t.account_ids_for_user(user_id);
        let ids = Tables::child_ids(&t.transactions_by_account, &account_ids);
        Ok(t.transactions.collect(&ids))
    }

    async fn insert_security(&self, security: NewSecurity) -> Result<Security> {
        Ok(self.tables()?.insert_security(security))
    }

    async fn upsert_security(&self, security: NewSecurity) -> Result<Security> {
        let mut t = self.tables()?;
        let existing = t
            .securities_by_external
            .get(&security.security_id)
            .and_then(|ids| ids.first())
            .copied();
        match existing {
            Some(id) => {
                let row = security.with_id(id);
                t.securities.rows.insert(id, row.clone());
                Ok(row)
            }
            None => Ok(t.insert_security(security)),
        }
    }

    async fn get_security(&self, security_id: &str) -> Result<Option<Security>> {
        let t = self.tables()?;
        Ok(t.securities_by_external
            .get(security_id)
            .and_then(|ids| ids.first())
            .and_then(|id| t.securities.rows.get(id))
            .cloned())
    }

    async fn insert_holding(&self, holding: NewHolding) -> Result<Holding> {
        let mut t = self.tables()?;
        t.ensure_account(holding.account_id)?;
        Ok(t.insert_holding(holding))
    }

    async fn upsert_holding(&self, holding: NewHolding) -> Result<Holding> {
        let mut t = self.tables()?;
        t.ensure_account(holding.account_id)?;
        match t.find_holding_id(holding.account_id, &holding.security_id) {
            Some(id) => {
                let row = holding.with_id(id);
                t.holdings.rows.insert(id, row.clone());
                Ok(row)
            }
            None => Ok(t.insert_holding(holding)),
        }
    }

    async fn get_holdings_by_user(&self, user_id: Id) -> Result<Vec<Holding>> {
        let t = self.tables()?;
        let account_ids = t.account_ids_for_user(user_id);
        let ids = Tables::child_ids(&t.holdings_by_account, &account_ids);
        Ok(t.holdings.collect(&ids))
    }

    async fn table_counts(&self) -> Result<TableCounts> {
        let t = self.tables()?;
        Ok(TableCounts {
            users: t.users.rows.len(),
            linked_items: t.linked_items.rows.len(),
            accounts: t.accounts.rows.len(),
            transactions: t.transactions.rows.len(),
            securities: t.securities.rows.len(),
            holdings: t.holdings.rows.len(),
        })
    }
}
