use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use ubl_core::api;
use ubl_core::bootstrap;
use ubl_core::config::LedgerConfig;
use ubl_core::health::{HealthMonitor, HealthThresholds};
use ubl_core::schema;
use ubl_core::store::EventStore;
use ubl_core::store::sqlite::SqliteBackend;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    match cli.command {
        cli::Command::Serve { host, port, db } => {
            let mut config = LedgerConfig::from_env()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(db) = db {
                config.database = Some(db);
            }
            api::serve(config).await
        }

        cli::Command::Bootstrap { db } => {
            let store = open_store(db)?;
            let primordial = bootstrap::bootstrap(&store).await?;
            if primordial.created {
                println!("seeded primordial realm `{}`", primordial.realm_id);
            } else {
                println!(
                    "already bootstrapped: realm `{}`, agreement `{}`",
                    primordial.realm_id, primordial.agreement_id
                );
            }
            Ok(())
        }

        cli::Command::Verify { db, from, to } => {
            let store = open_store(db)?;
            let report = store.verify_integrity(from, to).await?;
            if report.ok {
                println!("chain ok ({} events checked)", report.checked);
                Ok(())
            } else {
                eprintln!(
                    "chain BROKEN at sequence {}: {}",
                    report.broken_at.unwrap_or(0),
                    report.reason.as_deref().unwrap_or("unknown"),
                );
                std::process::exit(1);
            }
        }

        cli::Command::Health { db } => {
            let store = Arc::new(open_store(db)?);
            let monitor = HealthMonitor::new(store, HealthThresholds::default(), 3_600_000);
            let report = monitor.compute().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        cli::Command::Schema => schema::run(),
    }
}

/// Resolve the event store: `--db` flag, then UBL_DATABASE, else memory.
fn open_store(db: Option<PathBuf>) -> Result<EventStore> {
    let path = db.or_else(|| {
        std::env::var("UBL_DATABASE")
            .ok()
            .filter(|p| !p.is_empty() && p != ":memory:")
            .map(PathBuf::from)
    });
    Ok(match path {
        Some(path) => EventStore::new(Arc::new(SqliteBackend::open(&path)?)),
        None => EventStore::in_memory(),
    })
}
