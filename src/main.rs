use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};

use rorsync::model::{SyncSettings, UserSettings};
use rorsync::remote::{RemoteClient, StorageConfig};
use rorsync::store::LocalStore;
use rorsync::sync::SyncOrchestrator;
use rorsync::upload::{BatchUploader, list_batches};
use rorsync::worker::{SyncWorker, WorkerEvent};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "rorsync")]
#[command(about = "Offline sync for the municipal pipe-network dataset", long_about = None)]
struct Cli {
    /// Path to the user settings JSON file
    #[arg(long, default_value = "user_settings.json")]
    settings: PathBuf,

    /// Optional sync-configuration file overriding the built-in defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the remote snapshot and merge it into the local working copy
    Sync,

    /// Upload inspection batches and queued status changes
    Upload {
        /// Directory containing the batch directories
        path: PathBuf,
        /// Batch names to upload (defaults to every candidate under PATH)
        #[arg(long)]
        batch: Vec<String>,
    },

    /// List candidate batch directories, newest first
    Batches { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let user = UserSettings::load(&cli.settings)?;
    let settings = match &cli.config {
        Some(path) => SyncSettings::load(path)?,
        None => SyncSettings::default(),
    };

    match cli.command {
        Commands::Sync => run_sync(user, settings),
        Commands::Upload { path, batch } => run_upload(user, settings, path, batch),
        Commands::Batches { path } => {
            for name in list_batches(&path)? {
                println!("{}", name);
            }
            Ok(())
        }
    }
}

fn storage_config(user: &UserSettings, settings: &SyncSettings) -> StorageConfig {
    StorageConfig {
        base_url: user.storage_url.clone(),
        account_key: user.storage_key.clone(),
        environment: settings.environment.clone(),
    }
}

fn run_sync(user: UserSettings, settings: SyncSettings) -> Result<()> {
    let worker = SyncWorker::spawn(move |obs, cancel| {
        let store = LocalStore::open(
            &user.file_folder,
            &settings.db_name,
            &user.background_file_name(),
        )?;
        let remote = RemoteClient::new(storage_config(&user, &settings))?;
        let orchestrator =
            SyncOrchestrator::new(&store, &remote, &settings, &user, APP_VERSION, cancel);
        orchestrator.sync_now(obs)
    });
    drain(worker, "Synchronization complete")
}

fn run_upload(
    user: UserSettings,
    settings: SyncSettings,
    path: PathBuf,
    batches: Vec<String>,
) -> Result<()> {
    let worker = SyncWorker::spawn(move |obs, cancel| {
        let store = LocalStore::open(
            &user.file_folder,
            &settings.db_name,
            &user.background_file_name(),
        )?;
        let remote = RemoteClient::new(storage_config(&user, &settings))?;
        let uploader = BatchUploader::new(&remote, cancel);

        let names = if batches.is_empty() {
            list_batches(&path)?
        } else {
            batches.clone()
        };
        for name in &names {
            uploader.upload_batch(&path.join(name), obs)?;
        }
        uploader.upload_status_changes(&store, &settings, obs)
    });
    drain(worker, "Upload complete")
}

fn drain(worker: SyncWorker, success_message: &str) -> Result<()> {
    let mut failed = false;
    for event in worker.events.iter() {
        match event {
            WorkerEvent::ProcessName(name) => println!("{}", name),
            WorkerEvent::Progress(pct) => {
                if pct == 100 {
                    println!("  done");
                }
            }
            WorkerEvent::Info(msg) => println!("{}", msg),
            WorkerEvent::Warning(msg) => eprintln!("warning: {}", msg),
            WorkerEvent::Error { chain, .. } => eprintln!("error: {}", chain),
            WorkerEvent::Finished { failed: f } => {
                failed = f;
                break;
            }
        }
    }
    worker.join();
    if failed {
        bail!("something went wrong; operation aborted");
    }
    println!("{}", success_message);
    Ok(())
}
