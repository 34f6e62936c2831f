//! CLI command implementations

pub mod migrate;
pub mod serve;

use anyhow::{Context, Result};

use finboard_core::config::Config;

use crate::ServeArgs;

/// Environment configuration with command-line overrides applied
pub fn load_config(args: ServeArgs) -> Result<Config> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut Config, args: ServeArgs) {
    if let Some(listen) = args.listen {
        config.listen_addr = listen;
    }
    if let Some(store) = args.store {
        config.store = store;
    }
    if let Some(db_path) = args.db_path {
        config.db_path = Some(db_path);
    }
    if let Some(sync_mode) = args.sync_mode {
        config.sync_mode = sync_mode;
    }
}
