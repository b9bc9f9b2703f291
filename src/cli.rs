use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Universal Business Ledger — an event-sourced, hash-chained ledger for a
/// virtual agent economy.
#[derive(Parser)]
#[command(name = "ubl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the ledger service (intent endpoint, event stream, health sweep)
    Serve {
        /// Bind address
        #[arg(long)]
        host: Option<String>,

        /// Bind port
        #[arg(long)]
        port: Option<u16>,

        /// Sqlite event store path (defaults to UBL_DATABASE, else memory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Seed the genesis agreement, system entity, and primordial realm
    Bootstrap {
        /// Sqlite event store path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Verify hash-chain integrity over a sequence range
    Verify {
        /// Sqlite event store path
        #[arg(long)]
        db: Option<PathBuf>,

        /// First sequence to check
        #[arg(long)]
        from: Option<u64>,

        /// Last sequence to check
        #[arg(long)]
        to: Option<u64>,
    },

    /// Print the KPI health report
    Health {
        /// Sqlite event store path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Output the JSON schema for the intent envelope and event model
    Schema,
}
