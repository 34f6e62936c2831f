//! Migrate command - create or upgrade a DuckDB replica file

use std::path::Path;

use anyhow::{Context, Result};

use finboard_core::adapters::duckdb::DuckDbRepository;

pub fn run(db_path: &Path, json: bool) -> Result<()> {
    let repository = DuckDbRepository::new(db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    let result = repository
        .ensure_schema()
        .context("Failed to run migrations")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if result.applied.is_empty() {
        println!("Schema is up to date ({})", db_path.display());
    } else {
        for name in &result.applied {
            println!("Applied {}", name);
        }
    }
    Ok(())
}
