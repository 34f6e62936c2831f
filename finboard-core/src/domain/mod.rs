//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod holding;
mod linked_item;
pub mod money;
mod security;
mod transaction;
mod user;
pub mod result;

pub use account::{Account, NewAccount};
pub use holding::{Holding, HoldingView, NewHolding, UNKNOWN_SECURITY_NAME};
pub use linked_item::{LinkedItem, NewLinkedItem};
pub use security::{NewSecurity, Security};
pub use transaction::{NewTransaction, Transaction};
pub use user::{NewUser, User};

/// Store-assigned identifier. Ids grow monotonically per table, so id order
/// is insertion order.
pub type Id = i64;
