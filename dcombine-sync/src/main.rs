//! dcombine-sync - contact synchronization CLI
//!
//! Harvests remote lists and contacts, caches them in a JSON snapshot and
//! reconciles them into the local SQLite store.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dcombine_common::config::{CliOverrides, LoggingConfig, Settings};
use dcombine_common::db::init_database;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dcombine_sync::services::{
    self, ApiClient, Collection, ConsoleProgress, Harvester, PublishOptions, PublishOutcome, ReconcileReport,
    Reconciler, SaveMode, Snapshot, SnapshotStore,
};

/// Command-line arguments for dcombine-sync
#[derive(Parser, Debug)]
#[command(name = "dcombine-sync")]
#[command(about = "Synchronize remote contacts and lists into a local database")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(long, global = true, env = "DCOMBINE_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// JSON snapshot file
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Developer API key
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Account access token
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// Log level, used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download lists and contacts into the snapshot
    Harvest {
        /// Replace the snapshot instead of merging into it
        #[arg(long)]
        replace: bool,
    },
    /// Reconcile the snapshot into the database
    Combine,
    /// Harvest records modified since the last run and reconcile them
    Refresh,
    /// Harvest and reconcile, printing phase progress as JSON lines
    Task,
    /// Score stored contacts against an email and/or name
    Match {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first: Option<String>,
        #[arg(long)]
        last: Option<String>,
    },
    /// Print a stored contact in the remote record shape
    Export {
        /// Remote contact id
        cc_id: i64,
    },
    /// Post a stored contact to the remote API
    Publish {
        /// Remote contact id
        cc_id: i64,
        /// Skip the remote lookup by email
        #[arg(long)]
        no_check: bool,
        /// Post even when the remote already has the contact
        #[arg(long)]
        allow_update: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = CliOverrides {
        config: args.config.clone(),
        database: args.database.clone(),
        snapshot: args.snapshot.clone(),
        api_key: args.api_key.clone(),
        access_token: args.access_token.clone(),
    };
    let mut settings = Settings::resolve(&overrides).context("Failed to resolve configuration")?;
    if let Some(level) = &args.log_level {
        settings.logging.level = level.clone();
    }

    init_tracing(&settings.logging)?;

    info!("Starting dcombine-sync {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", settings.database_path.display());

    let pool = init_database(&settings.database_path)
        .await
        .context("Failed to open database")?;

    let cancel_token = CancellationToken::new();
    spawn_interrupt_handler(cancel_token.clone());

    let reconciler = Reconciler::new(pool.clone())?.with_cancellation(cancel_token);
    let store = SnapshotStore::new(settings.snapshot_path.clone());

    match args.command {
        Command::Harvest { replace } => {
            let harvester = harvester(&settings)?;
            let lists = harvester.harvest(Collection::Lists, None).await?;
            let contacts = harvester.harvest(Collection::Contacts, None).await?;
            if !lists.is_complete() || !contacts.is_complete() {
                warn!("Harvest ended early; saving the records gathered so far");
            }

            let snapshot = Snapshot {
                contacts: contacts.records,
                cclists: lists.records,
                ..Default::default()
            };
            let mode = if replace { SaveMode::Replace } else { SaveMode::Merge };
            let saved = store.save(&snapshot, mode)?;
            info!(
                contacts = saved.contacts.len(),
                lists = saved.cclists.len(),
                "Snapshot written to {}",
                store.path().display()
            );
        }
        Command::Combine => {
            let mut snapshot = store
                .load()
                .with_context(|| format!("Failed to read snapshot {}", store.path().display()))?;
            let report = reconciler
                .reconcile(&snapshot.cclists, &snapshot.contacts, &ConsoleProgress)
                .await;
            log_report(&report);

            if !report.remediation.is_empty() {
                snapshot.to_remediate.merge(&report.remediation);
                store.save(&snapshot, SaveMode::Replace)?;
            }
        }
        Command::Refresh => {
            let harvester = harvester(&settings)?;
            let outcome = services::refresh(&harvester, &reconciler, &ConsoleProgress).await?;
            if !outcome.harvest_complete {
                warn!("Refresh reconciled a partial harvest");
            }
            log_report(&outcome.report);
        }
        Command::Task => {
            let harvester = harvester(&settings)?;
            let (tx, mut rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    match serde_json::to_string(&progress) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Could not encode progress: {}", e),
                    }
                }
            });

            let report = services::run_task(&harvester, &reconciler, tx).await?;
            printer.await?;
            log_report(&report);
        }
        Command::Match { email, first, last } => {
            let scores =
                services::match_contacts(&pool, email.as_deref(), first.as_deref(), last.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&scores)?);
        }
        Command::Export { cc_id } => {
            let record = services::export_contact(&pool, cc_id).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Publish {
            cc_id,
            no_check,
            allow_update,
        } => {
            let client = ApiClient::new(&settings.api)?;
            let options = PublishOptions {
                check_existing: !no_check,
                allow_update,
            };
            match services::publish_contact(&client, &pool, &settings.harvest.contacts_uri, cc_id, options).await? {
                PublishOutcome::Skipped { .. } => info!("Contact {} not published", cc_id),
                PublishOutcome::Published { response } => {
                    println!("{}", serde_json::to_string_pretty(&response)?)
                }
            }
        }
    }

    pool.close().await;
    Ok(())
}

fn harvester(settings: &Settings) -> Result<Harvester> {
    settings.require_api_key()?;
    let client = ApiClient::new(&settings.api)?;
    Ok(Harvester::new(client, settings.harvest.clone()))
}

/// Install the fmt subscriber; RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn spawn_interrupt_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt requested, stopping after the current contact");
            token.cancel();
        }
    });
}

fn log_report(report: &ReconcileReport) {
    info!(
        lists_inserted = report.lists.inserted,
        lists_unchanged = report.lists.unchanged,
        list_conflicts = report.lists.conflicts,
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        remediation = report.remediation.len(),
        interrupted = report.interrupted,
        "Reconciliation finished: {}/{} contacts",
        report.processed,
        report.total
    );
}
