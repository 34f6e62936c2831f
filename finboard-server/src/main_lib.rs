//! Server state and process setup

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use finboard_core::config::Config;
use finboard_core::FinboardContext;

/// Shared handler state
pub type AppState = Arc<FinboardContext>;

/// Install the global tracing subscriber; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be set (tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub fn build_state(config: Config) -> anyhow::Result<AppState> {
    let context = FinboardContext::new(config)?;
    Ok(Arc::new(context))
}
