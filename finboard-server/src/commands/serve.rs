//! Serve command - run the HTTP API

use anyhow::{Context, Result};
use tracing::info;

use crate::api::app_router;
use crate::main_lib::{build_state, init_tracing};
use crate::scheduler::{start_session_pruner, SESSION_PRUNE_INTERVAL};
use crate::ServeArgs;

use super::load_config;

pub async fn run(args: ServeArgs) -> Result<()> {
    init_tracing();
    let config = load_config(args)?;
    let listen_addr = config.listen_addr;

    let state = build_state(config)?;
    start_session_pruner(state.clone(), SESSION_PRUNE_INTERVAL);

    let router = app_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", listen_addr))?;
    info!("Listening on {}", listen_addr);
    axum::serve(listener, router).await?;
    Ok(())
}
