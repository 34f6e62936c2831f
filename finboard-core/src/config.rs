//! Configuration management
//!
//! Everything is read from the environment:
//! ```text
//! PLAID_ENV=sandbox PLAID_CLIENT_ID=... PLAID_SECRET=... FINBOARD_STORE=duckdb
//! ```
//! The server binary overlays its command line arguments on top.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_SESSION_TTL_HOURS: u64 = 24;

/// Plaid deployment to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaidEnvironment {
    #[default]
    Sandbox,
    Development,
    Production,
}

impl PlaidEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => "https://sandbox.plaid.com",
            Self::Development => "https://development.plaid.com",
            Self::Production => "https://production.plaid.com",
        }
    }
}

impl FromStr for PlaidEnvironment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" => Ok(Self::Sandbox),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(Error::Config(format!("unknown PLAID_ENV '{}'", other))),
        }
    }
}

impl fmt::Display for PlaidEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sandbox => "sandbox",
            Self::Development => "development",
            Self::Production => "production",
        };
        f.write_str(name)
    }
}

/// How the sync routine writes replica rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Every sync inserts fresh rows; resyncing duplicates data
    Append,
    /// Rows are matched by external id and updated in place
    #[default]
    Upsert,
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "append" => Ok(Self::Append),
            "upsert" => Ok(Self::Upsert),
            other => Err(Error::Config(format!("unknown sync mode '{}'", other))),
        }
    }
}

/// Which Repository adapter backs the context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    DuckDb,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "duckdb" => Ok(Self::DuckDb),
            other => Err(Error::Config(format!("unknown store '{}'", other))),
        }
    }
}

/// Plaid credentials and endpoint
#[derive(Clone, Default)]
pub struct PlaidConfig {
    pub environment: PlaidEnvironment,
    pub client_id: String,
    pub secret: String,
    /// Overrides the environment's base URL (mock servers)
    pub base_url: Option<String>,
    pub enable_investments: bool,
}

impl PlaidConfig {
    pub fn base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn has_credentials(&self) -> bool {
        !self.client_id.is_empty() && !self.secret.is_empty()
    }
}

// Keep the secret out of logs
impl fmt::Debug for PlaidConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaidConfig")
            .field("environment", &self.environment)
            .field("client_id", &self.client_id)
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("enable_investments", &self.enable_investments)
            .finish()
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub plaid: PlaidConfig,
    pub sync_mode: SyncMode,
    pub store: StoreKind,
    /// DuckDB file; in-memory database when unset
    pub db_path: Option<PathBuf>,
    pub session_ttl: Duration,
    pub listen_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            plaid: PlaidConfig::default(),
            sync_mode: SyncMode::default(),
            store: StoreKind::default(),
            db_path: None,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_HOURS * 3600),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    ///
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(env) = get("PLAID_ENV") {
            config.plaid.environment = env.parse()?;
        }
        config.plaid.client_id = get("PLAID_CLIENT_ID").unwrap_or_default();
        config.plaid.secret = get("PLAID_SECRET").unwrap_or_default();
        config.plaid.base_url = get("PLAID_BASE_URL");
        if let Some(flag) = get("PLAID_ENABLE_INVESTMENTS") {
            config.plaid.enable_investments = parse_flag("PLAID_ENABLE_INVESTMENTS", &flag)?;
        }

        if let Some(mode) = get("FINBOARD_SYNC_MODE") {
            config.sync_mode = mode.parse()?;
        }
        if let Some(store) = get("FINBOARD_STORE") {
            config.store = store.parse()?;
        }
        config.db_path = get("FINBOARD_DB_PATH").map(PathBuf::from);

        if let Some(hours) = get("FINBOARD_SESSION_TTL_HOURS") {
            let hours: u64 = hours.trim().parse().map_err(|_| {
                Error::Config(format!("FINBOARD_SESSION_TTL_HOURS is not a number: '{}'", hours))
            })?;
            if hours == 0 {
                return Err(Error::Config(
                    "FINBOARD_SESSION_TTL_HOURS must be positive".to_string(),
                ));
            }
            config.session_ttl = Duration::from_secs(hours * 3600);
        }

        if let Some(addr) = get("FINBOARD_LISTEN") {
            config.listen_addr = addr
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid FINBOARD_LISTEN '{}'", addr)))?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{} is not a boolean: '{}'", key, other))),
    }
}
