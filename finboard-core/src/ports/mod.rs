//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod aggregation;
mod repository;

pub use aggregation::{
    AggregationProvider, ExternalAccount, ExternalHolding, ExternalHoldings, ExternalSecurity,
    ExternalTransaction, ItemCredentials, LinkToken,
};
pub use repository::{Repository, TableCounts};
