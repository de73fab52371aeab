//! Rekey: reference-integrity repair tool for the document store.
//!
//! Subcommands:
//! - `migrate`: plan and apply data-repair migrations behind an operator
//!   confirmation
//! - `report`: read-only reports over the store

use clap::{Parser, Subcommand};
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rekey_store::HttpStore;

mod confirm;
mod migrate;
mod report;
mod run;

use confirm::{AutoApprove, Confirm, StdinConfirm};

/// Name of the env var pointing a run at a local emulator.
const EMULATOR_HOST_ENV: &str = "REKEY_EMULATOR_HOST";

/// Label shown to the operator before confirmation. Informational only,
/// never enforced.
fn target_label() -> String {
    std::env::var(EMULATOR_HOST_ENV).unwrap_or_else(|_| "!PRODUCTION!".to_string())
}

#[derive(Parser)]
#[command(name = "rekey")]
#[command(about = "Reference-integrity repair for the document store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and apply data-repair migrations
    Migrate {
        /// Store URL
        #[arg(long, env = "REKEY_STORE_URL")]
        store_url: String,

        /// Bearer token for the store, if it requires one
        #[arg(long, env = "REKEY_STORE_TOKEN")]
        store_token: Option<String>,

        /// Migration name to run
        #[arg(value_name = "MIGRATION")]
        migration: Option<String>,

        /// List available migrations
        #[arg(long)]
        list: bool,

        /// Preview changes without applying (dry-run)
        #[arg(long)]
        dry_run: bool,

        /// Run all migrations in registry order
        #[arg(long)]
        all: bool,

        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,

        /// Keys per batched store lookup in the fill pass
        #[arg(
            long,
            default_value_t = migrate::DEFAULT_LOOKUP_BATCH,
            value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
        )]
        lookup_batch_size: usize,
    },

    /// Read-only reports over the store
    Report {
        /// Store URL
        #[arg(long, env = "REKEY_STORE_URL")]
        store_url: String,

        /// Bearer token for the store, if it requires one
        #[arg(long, env = "REKEY_STORE_TOKEN")]
        store_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "rekey=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Migrate {
            store_url,
            store_token,
            migration,
            list,
            dry_run,
            all,
            yes,
            lookup_batch_size,
        } => {
            let store = HttpStore::new(store_url, store_token);
            let confirmer: Box<dyn Confirm> = if yes {
                Box::new(AutoApprove)
            } else {
                Box::new(StdinConfirm)
            };
            run::run_migrate_command(
                &store,
                confirmer.as_ref(),
                &target_label(),
                migration.as_deref(),
                list,
                dry_run,
                all,
                lookup_batch_size,
            )
            .await
        }

        Commands::Report {
            store_url,
            store_token,
        } => {
            let store = HttpStore::new(store_url, store_token);
            report::run_cigar_fields_report(&store).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_batch_size_of_zero_is_rejected() {
        let result = Cli::try_parse_from([
            "rekey",
            "migrate",
            "--store-url",
            "http://localhost:9",
            "--list",
            "--lookup-batch-size",
            "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn lookup_batch_size_defaults_when_omitted() {
        let cli = Cli::try_parse_from([
            "rekey",
            "migrate",
            "--store-url",
            "http://localhost:9",
            "--list",
        ])
        .unwrap();

        let Commands::Migrate {
            lookup_batch_size, ..
        } = cli.command
        else {
            panic!("expected the migrate subcommand");
        };
        assert_eq!(lookup_batch_size, migrate::DEFAULT_LOOKUP_BATCH);
    }
}
