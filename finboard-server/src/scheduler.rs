//! Background housekeeping

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::main_lib::AppState;

/// How often expired sessions are dropped
pub const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Periodically remove expired sessions from the session store
pub fn start_session_pruner(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            match state.auth_service.prune_expired() {
                Ok(removed) => debug!(removed, "pruned expired sessions"),
                Err(e) => warn!(error = %e, "session prune failed"),
            }
        }
    })
}
