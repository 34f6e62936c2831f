//! Link service - connect new bank items
//!
//! A connection goes: link token → (client consent flow) → public token →
//! exchange → LinkedItem → initial sync.

use std::sync::Arc;

use tracing::{error, info};

use crate::domain::result::{Error, Result};
use crate::domain::{Id, LinkedItem, NewLinkedItem};
use crate::ports::{AggregationProvider, LinkToken, Repository};
use crate::services::sync::{SyncReport, SyncService};

/// Institution name stored when the client sends no institution id
pub const UNKNOWN_INSTITUTION: &str = "Unknown Institution";

/// A freshly linked item together with its initial sync
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub item: LinkedItem,
    pub report: SyncReport,
}

/// Link service for new bank connections
pub struct LinkService {
    repository: Arc<dyn Repository>,
    provider: Arc<dyn AggregationProvider>,
    sync: Arc<SyncService>,
}

impl LinkService {
    pub fn new(
        repository: Arc<dyn Repository>,
        provider: Arc<dyn AggregationProvider>,
        sync: Arc<SyncService>,
    ) -> Self {
        Self {
            repository,
            provider,
            sync,
        }
    }

    pub async fn create_link_token(&self, user_id: Id) -> Result<LinkToken> {
        self.provider.create_link_token(user_id).await.map_err(|e| {
            error!(user = user_id, error = %e, "link token creation failed");
            e
        })
    }

    /// Exchange a public token, record the item and run the first sync
    ///
    /// There is no compensation: if the sync fails, the item stays with
    /// whatever rows were written before the failure.
    pub async fn exchange(
        &self,
        user_id: Id,
        public_token: &str,
        institution_id: Option<&str>,
    ) -> Result<LinkOutcome> {
        if public_token.trim().is_empty() {
            return Err(Error::validation("public_token is required"));
        }

        let credentials = self.provider.exchange_public_token(public_token).await?;

        let institution_name = match institution_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => self.provider.get_institution_name(id).await?,
            None => UNKNOWN_INSTITUTION.to_string(),
        };

        let item = self
            .repository
            .create_linked_item(NewLinkedItem {
                user_id,
                access_token: credentials.access_token,
                item_id: credentials.item_id,
                institution_name,
                last_sync: None,
            })
            .await?;
        info!(
            user = user_id,
            linked_item = item.id,
            institution = %item.institution_name,
            "linked item"
        );

        let report = self.sync.sync_item(&item).await?;
        let item = self
            .repository
            .get_linked_item(item.id)
            .await?
            .ok_or_else(|| Error::not_found(format!("linked item {}", item.id)))?;

        Ok(LinkOutcome { item, report })
    }
}
