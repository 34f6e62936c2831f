//! DuckDB repository implementation
//!
//! Same contract as the in-memory store, backed by DuckDB. Opens an
//! in-memory database unless a file path is given.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, OptionalExt, Row};
use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, Holding, Id, LinkedItem, NewAccount, NewHolding, NewLinkedItem, NewSecurity,
    NewTransaction, NewUser, Security, Transaction, User,
};
use crate::ports::{Repository, TableCounts};
use crate::services::{MigrationResult, MigrationService};

const USER_COLUMNS: &str = "id, username, password_hash";

const LINKED_ITEM_COLUMNS: &str =
    "id, user_id, access_token, item_id, institution_name, last_sync";

const ACCOUNT_COLUMNS: &str = "a.id, a.linked_item_id, a.external_account_id, a.name, \
     a.account_type, a.subtype, CAST(a.balance AS VARCHAR), a.iso_currency_code";

const TRANSACTION_COLUMNS: &str = "t.id, t.account_id, t.external_transaction_id, \
     t.date::VARCHAR, t.name, CAST(t.amount AS VARCHAR), t.category, t.pending";

const SECURITY_COLUMNS: &str = "id, security_id, name, ticker_symbol, security_type, \
     CAST(close_price AS VARCHAR), update_date::VARCHAR";

const HOLDING_COLUMNS: &str = "h.id, h.account_id, h.security_id, CAST(h.quantity AS VARCHAR), \
     CAST(h.cost_basis AS VARCHAR), CAST(h.value AS VARCHAR), CAST(h.last_price AS VARCHAR), \
     h.price_as_of::VARCHAR";

/// Join from a user's linked items down to their accounts
const USER_ACCOUNTS_JOIN: &str = "FROM accounts a \
     JOIN linked_items li ON li.id = a.linked_item_id \
     WHERE li.user_id = ?";

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open a file-backed database
    pub fn new(db_path: &Path) -> Result<Self> {
        // Extension autoloading stays off: the store needs nothing beyond core SQL
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path.to_path_buf()),
        })
    }

    /// Open a process-local, non-durable database
    pub fn in_memory() -> Result<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<MigrationResult> {
        let conn = self.conn()?;
        MigrationService::new(&conn).run_pending()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::database(format!("Lock poisoned: {}", e)))
    }

    fn exists(conn: &Connection, table: &str, id: Id) -> Result<bool> {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE id = ?", table),
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn require(conn: &Connection, table: &str, what: &str, id: Id) -> Result<()> {
        if Self::exists(conn, table, id)? {
            Ok(())
        } else {
            Err(Error::not_found(format!("{} {}", what, id)))
        }
    }

    fn count(conn: &Connection, table: &str) -> Result<usize> {
        let count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // === Row writers (caller holds the lock) ===

    fn insert_account_row(conn: &Connection, account: NewAccount) -> Result<Account> {
        let id: Id = conn.query_row(
            "INSERT INTO accounts (linked_item_id, external_account_id, name, account_type,
                                   subtype, balance, iso_currency_code)
             VALUES (?, ?, ?, ?, ?, CAST(? AS DECIMAL(18, 2)), ?)
             RETURNING id",
            params![
                account.linked_item_id,
                account.external_account_id,
                account.name,
                account.account_type,
                account.subtype,
                account.balance.to_string(),
                account.iso_currency_code,
            ],
            |row| row.get(0),
        )?;
        Ok(account.with_id(id))
    }

    fn insert_transaction_row(conn: &Connection, tx: NewTransaction) -> Result<Transaction> {
        let id: Id = conn.query_row(
            "INSERT INTO transactions (account_id, external_transaction_id, date, name, amount,
                                       category, pending)
             VALUES (?, ?, CAST(? AS DATE), ?, CAST(? AS DECIMAL(18, 2)), ?, ?)
             RETURNING id",
            params![
                tx.account_id,
                tx.external_transaction_id,
                tx.date.format("%Y-%m-%d").to_string(),
                tx.name,
                tx.amount.to_string(),
                tx.category,
                tx.pending,
            ],
            |row| row.get(0),
        )?;
        Ok(tx.with_id(id))
    }

    fn insert_security_row(conn: &Connection, security: NewSecurity) -> Result<Security> {
        let id: Id = conn.query_row(
            "INSERT INTO securities (security_id, name, ticker_symbol, security_type,
                                     close_price, update_date)
             VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18, 2)), CAST(? AS DATE))
             RETURNING id",
            params![
                security.security_id,
                security.name,
                security.ticker_symbol,
                security.security_type,
                security.close_price.map(|p| p.to_string()),
                security.update_date.map(|d| d.format("%Y-%m-%d").to_string()),
            ],
            |row| row.get(0),
        )?;
        Ok(security.with_id(id))
    }

    fn insert_holding_row(conn: &Connection, holding: NewHolding) -> Result<Holding> {
        let id: Id = conn.query_row(
            "INSERT INTO holdings (account_id, security_id, quantity, cost_basis, value,
                                   last_price, price_as_of)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 6)), CAST(? AS DECIMAL(18, 2)),
                     CAST(? AS DECIMAL(18, 2)), CAST(? AS DECIMAL(18, 2)), CAST(? AS DATE))
             RETURNING id",
            params![
                holding.account_id,
                holding.security_id,
                holding.quantity.to_string(),
                holding.cost_basis.map(|c| c.to_string()),
                holding.value.to_string(),
                holding.last_price.to_string(),
                holding.price_as_of.format("%Y-%m-%d").to_string(),
            ],
            |row| row.get(0),
        )?;
        Ok(holding.with_id(id))
    }

    // === Row readers ===

    fn row_to_user(row: &Row) -> duckdb::Result<User> {
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
        })
    }

    fn row_to_linked_item(row: &Row) -> duckdb::Result<LinkedItem> {
        let last_sync: Option<String> = row.get(5)?;
        Ok(LinkedItem {
            id: row.get(0)?,
            user_id: row.get(1)?,
            access_token: row.get(2)?,
            item_id: row.get(3)?,
            institution_name: row.get(4)?,
            last_sync: last_sync.as_deref().and_then(parse_timestamp),
        })
    }

    fn row_to_account(row: &Row) -> duckdb::Result<Account> {
        Ok(Account {
            id: row.get(0)?,
            linked_item_id: row.get(1)?,
            external_account_id: row.get(2)?,
            name: row.get(3)?,
            account_type: row.get(4)?,
            subtype: row.get(5)?,
            balance: decimal_at(row, 6)?,
            iso_currency_code: row.get(7)?,
        })
    }

    fn row_to_transaction(row: &Row) -> duckdb::Result<Transaction> {
        Ok(Transaction {
            id: row.get(0)?,
            account_id: row.get(1)?,
            external_transaction_id: row.get(2)?,
            date: date_at(row, 3)?,
            name: row.get(4)?,
            amount: decimal_at(row, 5)?,
            category: row.get(6)?,
            pending: row.get(7)?,
        })
    }

    fn row_to_security(row: &Row) -> duckdb::Result<Security> {
        Ok(Security {
            id: row.get(0)?,
            security_id: row.get(1)?,
            name: row.get(2)?,
            ticker_symbol: row.get(3)?,
            security_type: row.get(4)?,
            close_price: optional_decimal_at(row, 5)?,
            update_date: optional_date_at(row, 6)?,
        })
    }

    fn row_to_holding(row: &Row) -> duckdb::Result<Holding> {
        Ok(Holding {
            id: row.get(0)?,
            account_id: row.get(1)?,
            security_id: row.get(2)?,
            // DECIMAL(18, 6) pads; drop the trailing zeros again
            quantity: decimal_at(row, 3)?.normalize(),
            cost_basis: optional_decimal_at(row, 4)?,
            value: decimal_at(row, 5)?,
            last_price: decimal_at(row, 6)?,
            price_as_of: date_at(row, 7)?,
        })
    }

    fn query_all<T>(
        conn: &Connection,
        sql: &str,
        param: Id,
        map: fn(&Row) -> duckdb::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![param], |row| map(row))?;
        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }
}

#[async_trait]
impl Repository for DuckDbRepository {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let conn = self.conn()?;
        let taken: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?",
            params![user.username],
            |row| row.get(0),
        )?;
        if taken > 0 {
            return Err(Error::conflict(format!(
                "username '{}' already exists",
                user.username
            )));
        }
        let id: Id = conn.query_row(
            "INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING id",
            params![user.username, user.password_hash],
            |row| row.get(0),
        )?;
        Ok(user.with_id(id))
    }

    async fn get_user(&self, id: Id) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
                params![id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS),
                params![username],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    async fn create_linked_item(&self, item: NewLinkedItem) -> Result<LinkedItem> {
        let conn = self.conn()?;
        Self::require(&conn, "users", "user", item.user_id)?;
        let id: Id = conn.query_row(
            "INSERT INTO linked_items (user_id, access_token, item_id, institution_name, last_sync)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
            params![
                item.user_id,
                item.access_token,
                item.item_id,
                item.institution_name,
                item.last_sync.map(|t| t.to_rfc3339()),
            ],
            |row| row.get(0),
        )?;
        Ok(item.with_id(id))
    }

    async fn get_linked_item(&self, id: Id) -> Result<Option<LinkedItem>> {
        let conn = self.conn()?;
        let item = conn
            .query_row(
                &format!("SELECT {} FROM linked_items WHERE id = ?", LINKED_ITEM_COLUMNS),
                params![id],
                Self::row_to_linked_item,
            )
            .optional()?;
        Ok(item)
    }

    async fn get_linked_items_by_user(&self, user_id: Id) -> Result<Vec<LinkedItem>> {
        let conn = self.conn()?;
        Self::query_all(
            &conn,
            &format!(
                "SELECT {} FROM linked_items WHERE user_id = ? ORDER BY id",
                LINKED_ITEM_COLUMNS
            ),
            user_id,
            Self::row_to_linked_item,
        )
    }

    async fn touch_last_sync(&self, id: Id) -> Result<LinkedItem> {
        let conn = self.conn()?;
        Self::require(&conn, "linked_items", "linked item", id)?;
        conn.execute(
            "UPDATE linked_items SET last_sync = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), id],
        )?;
        let item = conn.query_row(
            &format!("SELECT {} FROM linked_items WHERE id = ?", LINKED_ITEM_COLUMNS),
            params![id],
            Self::row_to_linked_item,
        )?;
        Ok(item)
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Account> {
        let conn = self.conn()?;
        Self::require(&conn, "linked_items", "linked item", account.linked_item_id)?;
        Self::insert_account_row(&conn, account)
    }

    async fn upsert_account(&self, account: NewAccount) -> Result<Account> {
        let conn = self.conn()?;
        Self::require(&conn, "linked_items", "linked item", account.linked_item_id)?;
        let existing: Option<Id> = conn
            .query_row(
                "SELECT id FROM accounts WHERE linked_item_id = ? AND external_account_id = ?
                 ORDER BY id LIMIT 1",
                params![account.linked_item_id, account.external_account_id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE accounts SET name = ?, account_type = ?, subtype = ?,
                            balance = CAST(? AS DECIMAL(18, 2)), iso_currency_code = ?
                     WHERE id = ?",
                    params![
                        account.name,
                        account.account_type,
                        account.subtype,
                        account.balance.to_string(),
                        account.iso_currency_code,
                        id,
                    ],
                )?;
                Ok(account.with_id(id))
            }
            None => Self::insert_account_row(&conn, account),
        }
    }

    async fn get_account_by_external_id(
        &self,
        linked_item_id: Id,
        external_account_id: &str,
    ) -> Result<Option<Account>> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                &format!(
                    "SELECT {} FROM accounts a
                     WHERE a.linked_item_id = ? AND a.external_account_id = ?
                     ORDER BY a.id LIMIT 1",
                    ACCOUNT_COLUMNS
                ),
                params![linked_item_id, external_account_id],
                Self::row_to_account,
            )
            .optional()?;
        Ok(account)
    }

    async fn get_accounts_by_user(&self, user_id: Id) -> Result<Vec<Account>> {
        let conn = self.conn()?;
        Self::query_all(
            &conn,
            &format!("SELECT {} {} ORDER BY a.id", ACCOUNT_COLUMNS, USER_ACCOUNTS_JOIN),
            user_id,
            Self::row_to_account,
        )
    }

    async fn insert_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        Self::require(&conn, "accounts", "account", tx.account_id)?;
        Self::insert_transaction_row(&conn, tx)
    }

    async fn upsert_transaction(&self, tx: NewTransaction) -> Result<Transaction> {
        let conn = self.conn()?;
        Self::require(&conn, "accounts", "account", tx.account_id)?;
        let existing: Option<Id> = conn
            .query_row(
                "SELECT id FROM transactions WHERE account_id = ? AND external_transaction_id = ?
                 ORDER BY id LIMIT 1",
                params![tx.account_id, tx.external_transaction_id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE transactions SET date = CAST(? AS DATE), name = ?,
                            amount = CAST(? AS DECIMAL(18, 2)), category = ?, pending = ?
                     WHERE id = ?",
                    params![
                        tx.date.format("%Y-%m-%d").to_string(),
                        tx.name,
                        tx.amount.to_string(),
                        tx.category,
                        tx.pending,
                        id,
                    ],
                )?;
                Ok(tx.with_id(id))
            }
            None => Self::insert_transaction_row(&conn, tx),
        }
    }

    async fn get_transactions_by_user(&self, user_id: Id) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        Self::query_all(
            &conn,
            &format!(
                "SELECT {} FROM transactions t
                 WHERE t.account_id IN (SELECT a.id {})
                 ORDER BY t.id",
                TRANSACTION_COLUMNS, USER_ACCOUNTS_JOIN
            ),
            user_id,
            Self::row_to_transaction,
        )
    }

    async fn insert_security(&self, security: NewSecurity) -> Result<Security> {
        let conn = self.conn()?;
        Self::insert_security_row(&conn, security)
    }

    async fn upsert_security(&self, security: NewSecurity) -> Result<Security> {
        let conn = self.conn()?;
        let existing: Option<Id> = conn
            .query_row(
                "SELECT id FROM securities WHERE security_id = ? ORDER BY id LIMIT 1",
                params![security.security_id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE securities SET name = ?, ticker_symbol = ?, security_type = ?,
                            close_price = CAST(? AS DECIMAL(18, 2)), update_date = CAST(? AS DATE)
                     WHERE id = ?",
                    params![
                        security.name,
                        security.ticker_symbol,
                        security.security_type,
                        security.close_price.map(|p| p.to_string()),
                        security.update_date.map(|d| d.format("%Y-%m-%d").to_string()),
                        id,
                    ],
                )?;
                Ok(security.with_id(id))
            }
            None => Self::insert_security_row(&conn, security),
        }
    }

    async fn get_security(&self, security_id: &str) -> Result<Option<Security>> {
        let conn = self.conn()?;
        let security = conn
            .query_row(
                &format!(
                    "SELECT {} FROM securities WHERE security_id = ? ORDER BY id LIMIT 1",
                    SECURITY_COLUMNS
                ),
                params![security_id],
                Self::row_to_security,
            )
            .optional()?;
        Ok(security)
    }

    async fn insert_holding(&self, holding: NewHolding) -> Result<Holding> {
        let conn = self.conn()?;
        Self::require(&conn, "accounts", "account", holding.account_id)?;
        Self::insert_holding_row(&conn, holding)
    }

    async fn upsert_holding(&self, holding: NewHolding) -> Result<Holding> {
        let conn = self.conn()?;
        Self::require(&conn, "accounts", "account", holding.account_id)?;
        let existing: Option<Id> = conn
            .query_row(
                "SELECT id FROM holdings WHERE account_id = ? AND security_id = ?
                 ORDER BY id LIMIT 1",
                params![holding.account_id, holding.security_id],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE holdings SET quantity = CAST(? AS DECIMAL(18, 6)),
                            cost_basis = CAST(? AS DECIMAL(18, 2)),
                            value = CAST(? AS DECIMAL(18, 2)),
                            last_price = CAST(? AS DECIMAL(18, 2)),
                            price_as_of = CAST(? AS DATE)
                     WHERE id = ?",
                    params![
                        holding.quantity.to_string(),
                        holding.cost_basis.map(|c| c.to_string()),
                        holding.value.to_string(),
                        holding.last_price.to_string(),
                        holding.price_as_of.format("%Y-%m-%d").to_string(),
                        id,
                    ],
                )?;
                Ok(holding.with_id(id))
            }
            None => Self::insert_holding_row(&conn, holding),
        }
    }

    async fn get_holdings_by_user(&self, user_id: Id) -> Result<Vec<Holding>> {
        let conn = self.conn()?;
        Self::query_all(
            &conn,
            &format!(
                "SELECT {} FROM holdings h
                 WHERE h.account_id IN (SELECT a.id {})
                 ORDER BY h.id",
                HOLDING_COLUMNS, USER_ACCOUNTS_JOIN
            ),
            user_id,
            Self::row_to_holding,
        )
    }

    async fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.conn()?;
        Ok(TableCounts {
            users: Self::count(&conn, "users")?,
            linked_items: Self::count(&conn, "linked_items")?,
            accounts: Self::count(&conn, "accounts")?,
            transactions: Self::count(&conn, "transactions")?,
            securities: Self::count(&conn, "securities")?,
            holdings: Self::count(&conn, "holdings")?,
        })
    }
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn decimal_at(row: &Row, idx: usize) -> duckdb::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| conversion_error(idx, e))
}

fn optional_decimal_at(row: &Row, idx: usize) -> duckdb::Result<Option<Decimal>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| Decimal::from_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn date_at(row: &Row, idx: usize) -> duckdb::Result<NaiveDate> {
    let s: String = row.get(idx)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e))
}

fn optional_date_at(row: &Row, idx: usize) -> duckdb::Result<Option<NaiveDate>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
