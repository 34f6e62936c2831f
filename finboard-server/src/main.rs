//! Finboard - personal finance dashboard server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use finboard_core::config::{StoreKind, SyncMode};

mod api;
mod commands;
mod error;
mod main_lib;
mod scheduler;
mod session;

/// Finboard - bank accounts, transactions and investments in one dashboard
#[derive(Parser)]
#[command(name = "finboard", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve(ServeArgs),

    /// Create or upgrade the DuckDB schema
    Migrate {
        /// DuckDB file to migrate
        #[arg(long, env = "FINBOARD_DB_PATH")]
        db_path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Overrides on top of the environment configuration
#[derive(Args, Clone, Default)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "FINBOARD_LISTEN")]
    pub listen: Option<SocketAddr>,
    /// Replica store (memory, duckdb)
    #[arg(long, env = "FINBOARD_STORE")]
    pub store: Option<StoreKind>,
    /// DuckDB file; in-memory when unset
    #[arg(long, env = "FINBOARD_DB_PATH")]
    pub db_path: Option<PathBuf>,
    /// How resyncs write rows (append, upsert)
    #[arg(long, env = "FINBOARD_SYNC_MODE")]
    pub sync_mode: Option<SyncMode>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => commands::serve::run(cli.serve).await,
        Some(Commands::Serve(args)) => commands::serve::run(args).await,
        Some(Commands::Migrate { db_path, json }) => commands::migrate::run(&db_path, json),
    }
}
