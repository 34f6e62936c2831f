//! Linked item domain model - one external bank connection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// A bank or brokerage connection authorized by a user
///
/// The access token is a durable upstream credential; it stays server-side
/// and is skipped when the item is serialized into API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedItem {
    pub id: Id,
    pub user_id: Id,
    #[serde(skip_serializing, default)]
    pub access_token: String,
    /// Upstream item identifier
    pub item_id: String,
    pub institution_name: String,
    pub last_sync: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewLinkedItem {
    pub user_id: Id,
    pub access_token: String,
    pub item_id: String,
    pub institution_name: String,
    pub last_sync: Option<DateTime<Utc>>,
}

impl NewLinkedItem {
    pub fn with_id(self, id: Id) -> LinkedItem {
        LinkedItem {
            id,
            user_id: self.user_id,
            access_token: self.access_token,
            item_id: self.item_id,
            institution_name: self.institution_name,
            last_sync: self.last_sync,
        }
    }
}
