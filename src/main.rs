#![deny(unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use capture_store::constants::exit;
use capture_store::paths::DataDir;
use capture_store::store::{BackupManager, CaptureRecord, ConfigValue, LoggingHooks, Store};
use capture_store::{StoreError, StoreResult};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "capture-store")]
#[command(version)]
#[command(
    about = "Inspect and maintain the capture utility's settings and history",
    long_about = None
)]
struct Cli {
    /// Data directory holding the database (defaults to the platform config dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read and edit settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Inspect and edit capture history
    #[command(subcommand)]
    Captures(CapturesCommand),
    /// Manage database backups
    #[command(subcommand)]
    Backup(BackupCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print one setting as JSON
    Get { key: String },
    /// Set a setting; VALUE is parsed as JSON, falling back to a plain string
    Set { key: String, value: String },
    /// Remove a setting
    Unset { key: String },
    /// Print every setting
    List,
}

#[derive(Subcommand)]
enum CapturesCommand {
    /// Print the history, newest first
    List {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Delete every capture with this millisecond timestamp
    Delete { timestamp: i64 },
    /// Delete the whole history
    Purge,
    /// Import captures from a JSON array file
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum BackupCommand {
    /// Archive the current database
    Create(CreateBackupArgs),
    /// List archives, newest first
    List,
    /// Replace the database with an archive
    Restore { filename: String },
    /// Remove one archive
    Delete { filename: String },
    /// Keep only the newest N automatic archives
    Prune {
        #[arg(long, default_value_t = 5)]
        keep: u32,
    },
    /// Archive automatically if the last automatic archive is old enough
    Auto(AutoBackupArgs),
}

#[derive(Args)]
struct CreateBackupArgs {
    /// Mark as manual so pruning never removes it
    #[arg(long)]
    manual: bool,
}

#[derive(Args)]
struct AutoBackupArgs {
    /// Days between automatic archives; 0 disables them
    #[arg(long, default_value_t = 1)]
    interval_days: u32,
    /// Automatic archives to keep afterwards
    #[arg(long, default_value_t = 5)]
    keep: u32,
}

fn main() {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::Fatal(fatal)) => {
                error!(error = ?fatal, "Unrecoverable store failure, terminating");
                std::process::exit(exit::FATAL);
            }
            None => {
                error!(error = ?err, "Command failed");
                std::process::exit(exit::FAILURE);
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let data_dir = DataDir::resolve(cli.data_dir);
    let backups = BackupManager::new(data_dir.root());

    let open_store = || Store::open_and_load(data_dir.db_path(), Arc::new(LoggingHooks));

    match cli.command {
        Command::Config(cmd) => run_config(&open_store()?, cmd),
        Command::Captures(cmd) => run_captures(&open_store()?, cmd),
        Command::Backup(cmd) => run_backup(&backups, cmd, open_store),
    }
}

fn run_config(store: &Store, cmd: ConfigCommand) -> Result<()> {
    let config = store.config();
    match cmd {
        ConfigCommand::Get { key } => match config.get(&key) {
            Some(value) => println!("{value}"),
            None => anyhow::bail!("No setting named '{}'", key),
        },
        ConfigCommand::Set { key, value } => {
            let value = ConfigValue::from_json(&value).unwrap_or(ConfigValue::String(value));
            config.set(key, value);
            config.flush()?;
        }
        ConfigCommand::Unset { key } => {
            if config.remove(&key).is_none() {
                anyhow::bail!("No setting named '{}'", key);
            }
            config.flush()?;
        }
        ConfigCommand::List => {
            let snapshot = config.snapshot();
            for key in config.keys() {
                if let Some(value) = snapshot.get(&key) {
                    println!("{key} = {value}");
                }
            }
        }
    }
    Ok(())
}

fn run_captures(store: &Store, cmd: CapturesCommand) -> Result<()> {
    let captures = store.captures();
    match cmd {
        CapturesCommand::List { json } => {
            let records = captures.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in &records {
                    println!(
                        "{}\t{}\t{}\t{}",
                        record.timestamp,
                        if record.success { "ok" } else { "failed" },
                        record.filename,
                        record.url.as_deref().unwrap_or("-"),
                    );
                }
            }
        }
        CapturesCommand::Delete { timestamp } => {
            let removed = captures.delete(timestamp)?;
            info!(timestamp, removed, "Deleted captures");
        }
        CapturesCommand::Purge => {
            captures.purge()?;
        }
        CapturesCommand::Import { file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let records: Vec<CaptureRecord> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse captures from {}", file.display()))?;
            captures.bulk_append(&records)?;
        }
    }
    Ok(())
}

fn run_backup(
    backups: &BackupManager,
    cmd: BackupCommand,
    open_store: impl FnOnce() -> StoreResult<Store>,
) -> Result<()> {
    match cmd {
        BackupCommand::Create(args) => {
            let path = backups.create_backup(&open_store()?, args.manual)?;
            println!("{}", path.display());
        }
        BackupCommand::List => {
            for entry in backups.list_backups()? {
                let datetime: chrono::DateTime<chrono::Local> = entry.timestamp.into();
                println!(
                    "{}\t{}\t{}",
                    datetime.format("%Y-%m-%d %H:%M:%S"),
                    if entry.is_manual { "manual" } else { "auto" },
                    entry.filename
                );
            }
        }
        // Restoring swaps the database file, so the store stays closed
        BackupCommand::Restore { filename } => backups.restore_backup(&filename)?,
        BackupCommand::Delete { filename } => backups.delete_backup(&filename)?,
        BackupCommand::Prune { keep } => {
            let pruned = backups.prune_backups(keep)?;
            info!(pruned, keep, "Pruned backups");
        }
        BackupCommand::Auto(args) => {
            let store = open_store()?;
            match backups.run_auto_backup(&store, args.interval_days, args.keep)? {
                Some(path) => println!("{}", path.display()),
                None => info!(interval_days = args.interval_days, "No automatic backup due"),
            }
        }
    }
    Ok(())
}
