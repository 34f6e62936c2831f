//! Finboard Core - Business logic for the personal finance dashboard
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (User, LinkedItem, Account, Transaction, ...)
//! - **ports**: Trait definitions for external dependencies (Repository, AggregationProvider)
//! - **services**: Business logic orchestration (sync, queries, auth, dashboard)
//! - **adapters**: Concrete implementations (in-memory store, DuckDB, Plaid)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::sync::Arc;

use tracing::info;

use adapters::duckdb::DuckDbRepository;
use adapters::memory::MemoryRepository;
use adapters::plaid::PlaidClient;
use config::{Config, StoreKind};
use ports::{AggregationProvider, Repository};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, Result};
pub use domain::{Account, HoldingView, Id, LinkedItem, Transaction, User};

/// Main context for Finboard operations
///
/// This is the primary entry point for all business logic. It holds
/// the store, the upstream provider, configuration, and all services.
pub struct FinboardContext {
    pub config: Config,
    pub repository: Arc<dyn Repository>,
    pub provider: Arc<dyn AggregationProvider>,
    pub auth_service: Arc<AuthService>,
    pub sync_service: Arc<SyncService>,
    pub link_service: Arc<LinkService>,
    pub query_service: Arc<QueryService>,
    pub dashboard_service: Arc<DashboardService>,
}

impl FinboardContext {
    /// Create a context with the store and Plaid client the config selects
    pub fn new(config: Config) -> Result<Self> {
        let repository: Arc<dyn Repository> = match config.store {
            StoreKind::Memory => Arc::new(MemoryRepository::new()),
            StoreKind::DuckDb => {
                let repository = match &config.db_path {
                    Some(path) => DuckDbRepository::new(path)?,
                    None => DuckDbRepository::in_memory()?,
                };
                let migrations = repository.ensure_schema()?;
                info!(
                    path = ?repository.db_path(),
                    applied = migrations.applied.len(),
                    "opened duckdb store"
                );
                Arc::new(repository)
            }
        };
        let plaid = PlaidClient::new(&config.plaid)?;
        info!(
            plaid_env = %config.plaid.environment,
            url = plaid.base_url(),
            "plaid client ready"
        );
        let provider: Arc<dyn AggregationProvider> = Arc::new(plaid);

        let context = Self::with_parts(config, repository, provider);
        info!(
            store = ?context.config.store,
            provider = context.provider.name(),
            sync_mode = ?context.sync_service.mode(),
            "finboard context ready"
        );
        Ok(context)
    }

    /// Create a context from explicit parts (tests, alternative providers)
    pub fn with_parts(
        config: Config,
        repository: Arc<dyn Repository>,
        provider: Arc<dyn AggregationProvider>,
    ) -> Self {
        let auth_service = Arc::new(AuthService::new(
            Arc::clone(&repository),
            config.session_ttl,
        ));
        Self::assemble(config, repository, provider, auth_service)
    }

    /// Like `with_parts`, with explicit password hashing costs
    pub fn with_password_params(
        config: Config,
        repository: Arc<dyn Repository>,
        provider: Arc<dyn AggregationProvider>,
        params: PasswordParams,
    ) -> Self {
        let auth_service = Arc::new(AuthService::with_params(
            Arc::clone(&repository),
            config.session_ttl,
            params,
        ));
        Self::assemble(config, repository, provider, auth_service)
    }

    fn assemble(
        config: Config,
        repository: Arc<dyn Repository>,
        provider: Arc<dyn AggregationProvider>,
        auth_service: Arc<AuthService>,
    ) -> Self {
        let sync_service = Arc::new(SyncService::new(
            Arc::clone(&repository),
            Arc::clone(&provider),
            config.sync_mode,
        ));
        let link_service = Arc::new(LinkService::new(
            Arc::clone(&repository),
            Arc::clone(&provider),
            Arc::clone(&sync_service),
        ));
        let query_service = Arc::new(QueryService::new(Arc::clone(&repository)));
        let dashboard_service = Arc::new(DashboardService::new(Arc::clone(&query_service)));

        Self {
            config,
            repository,
            provider,
            auth_service,
            sync_service,
            link_service,
            query_service,
            dashboard_service,
        }
    }
}
