//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - In-memory tables for the Repository port (default)
//! - DuckDB for the Repository port
//! - Plaid HTTP client for AggregationProvider

pub mod duckdb;
pub mod memory;
pub mod plaid;

#[cfg(test)]
pub mod plaid_mock;
