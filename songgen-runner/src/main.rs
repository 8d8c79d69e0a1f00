//! songgen-runner - one generation job per process
//!
//! Exit status is 0 when the song was persisted and 1 otherwise. Failures are
//! reported to the record store and the operators before exiting.

use anyhow::{Context, Result};
use clap::Parser;
use songgen_common::config::{ensure_directory_exists, load_toml, resolve_config_path, resolve_root_folder};
use songgen_runner::alerts::alerter_from_config;
use songgen_runner::config::{JobParams, RunnerConfig, RunnerToml};
use songgen_runner::page::WebDriverLauncher;
use songgen_runner::store::{LocalProfileArchive, SqliteRecordStore};
use songgen_runner::verification::ConfiguredChannels;
use songgen_runner::JobRunner;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "songgen-runner", version, about = "Run one song generation job")]
struct Args {
    /// TOML bootstrap file
    #[arg(long, env = "SONGGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Working root folder (database, profiles, downloads, artifacts)
    #[arg(long, env = "SONGGEN_ROOT")]
    root_folder: Option<PathBuf>,

    /// Generation record to fulfil
    #[arg(long, env = "GENERATION_ID")]
    generation_id: String,

    /// Identity (phone number) to sign in as
    #[arg(long, env = "PHONE_NUMBER")]
    phone_number: String,

    /// Wall-clock ceiling for the job, in seconds
    #[arg(long, env = "MAX_RUNTIME")]
    max_runtime: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            // The subscriber may not be installed yet
            eprintln!("songgen-runner: {:#}", e);
            error!(error = %format!("{:#}", e), "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<bool> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), "SONGGEN_CONFIG");
    let toml: RunnerToml = load_toml(config_path.as_deref()).context("Failed to load configuration")?;
    songgen_common::logging::init_tracing(&toml.logging).context("Failed to initialise logging")?;

    info!(
        "Starting songgen-runner {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );

    let root_folder = resolve_root_folder(
        args.root_folder.as_deref(),
        "SONGGEN_ROOT",
        toml.root_folder.as_deref(),
    );
    ensure_directory_exists(&root_folder).context("Failed to initialise root folder")?;
    info!("Root folder: {}", root_folder.display());

    let config = Arc::new(RunnerConfig::from_toml(toml, root_folder));
    info!("Database: {}", config.database_path.display());

    let store = SqliteRecordStore::open(&config.database_path, config.root_folder.join("artifacts"))
        .await
        .context("Failed to open the record store")?;

    let runner = JobRunner::new(
        config.clone(),
        Arc::new(store),
        Arc::new(LocalProfileArchive::new(config.archive_dir.clone())),
        alerter_from_config(&config.alerts),
        Arc::new(WebDriverLauncher::new(config.webdriver.endpoint.clone())),
        Arc::new(ConfiguredChannels::new(config.verification.clone())),
    );

    let params = JobParams {
        generation_id: args.generation_id,
        identity: args.phone_number,
        max_runtime: Duration::from_secs(args.max_runtime),
    };
    Ok(runner.run_job(&params).await)
}
