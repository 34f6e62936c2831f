//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod auth;
mod dashboard;
mod link;
pub mod migration;
mod query;
pub mod sync;

pub use auth::{AuthService, PasswordParams, Session, SessionStore};
pub use dashboard::{DashboardService, DashboardSummary, NamedAmount};
pub use link::{LinkOutcome, LinkService, UNKNOWN_INSTITUTION};
pub use migration::{MigrationResult, MigrationService};
pub use query::QueryService;
pub use sync::{SyncReport, SyncService};
