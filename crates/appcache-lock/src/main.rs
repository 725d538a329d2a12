//! `AppCache-Lock`
//!
//! Locks configured application and resource directories into the page
//! cache within a memory budget.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use appcache_core::config::ConfigLists;
use appcache_core::memory::{MemoryInfo, budget_bytes};
use appcache_core::tracing_init::{default_filter, init_tracing};
use appcache_core::{DirectoryCatalog, Settings, select};
use appcache_lock::candidates::gather_candidates;
use appcache_lock::report;
use appcache_lock::shutdown::{ShutdownHandle, spawn_signal_listener};
use appcache_lock::{
    LockOrchestrator, OrchestratorConfig, OrchestratorState, RunLimits, RunStatus, RunSupervisor,
    VmtouchLocker,
};

/// Exit status after an interrupt or terminate signal.
const INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "appcache-lock")]
#[command(version, about = "Lock application and resource directories into memory")]
struct Cli {
    /// Directory containing app_commands, resource_dirs and settings.json
    #[arg(long, global = true, default_value = ".", env = "APPCACHE_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Memory limit as a percentage of total RAM (1-90)
    #[arg(long, global = true)]
    memory_limit: Option<f64>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs as JSON.
    #[arg(long, global = true, env = "APPCACHE_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lock the selected directories into memory
    Preload {
        /// Maximum concurrent lock operations
        #[arg(long)]
        max_workers: Option<usize>,

        /// Timeout in seconds for each lock operation
        #[arg(long)]
        timeout: Option<u64>,

        /// Seconds between terminate request and forced kill
        #[arg(long)]
        grace: Option<u64>,

        /// Lock tool binary
        #[arg(long)]
        locker_bin: Option<PathBuf>,

        /// Never prefix the lock tool with `sudo -n`
        #[arg(long)]
        no_sudo: bool,
    },
    /// Show directory sizes and the memory budget without locking
    VerifySizes,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_tracing(
        &default_filter(&["appcache_lock", "appcache_core"], cli.verbose),
        cli.log_json,
    );

    let mut settings = Settings::load(&cli.config_dir)
        .with_context(|| format!("Failed to load settings from {}", cli.config_dir.display()))?;
    if let Some(limit) = cli.memory_limit {
        settings.memory_limit_percent = limit;
    }

    match cli.command {
        Commands::Preload {
            max_workers,
            timeout,
            grace,
            locker_bin,
            no_sudo,
        } => {
            if let Some(n) = max_workers {
                settings.max_workers = n;
            }
            if let Some(secs) = timeout {
                settings.timeout_secs = secs;
            }
            if let Some(secs) = grace {
                settings.terminate_grace_secs = secs;
            }
            if let Some(bin) = locker_bin {
                settings.locker_bin = bin;
            }
            if no_sudo {
                settings.use_sudo = false;
            }
            settings.validate()?;
            preload(&cli.config_dir, &settings).await
        }
        Commands::VerifySizes => {
            settings.validate()?;
            verify_sizes(&cli.config_dir, &settings).await
        }
    }
}

async fn preload(config_dir: &Path, settings: &Settings) -> anyhow::Result<ExitCode> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_dir = %config_dir.display(),
        memory_limit_percent = settings.memory_limit_percent,
        max_workers = settings.max_workers,
        "Starting appcache-lock"
    );

    let locker = VmtouchLocker::from_settings(settings);
    let supervisor = RunSupervisor::new(LockOrchestrator::new(
        Arc::new(locker),
        OrchestratorConfig::from_settings(settings),
    ));
    if !supervisor.orchestrator().dependency_available() {
        error!(
            program = %settings.locker_bin.display(),
            "Lock tool is not installed or not in PATH (install it, e.g. `sudo apt install vmtouch`)"
        );
        return Ok(ExitCode::FAILURE);
    }
    let listener = spawn_signal_listener(supervisor.shutdown_handle());

    let memory_before = MemoryInfo::read()?;
    let budget = budget_bytes(memory_before.total, settings.memory_limit_percent);

    let lists = ConfigLists::load(config_dir)?;
    if lists.is_empty() {
        error!("No applications or resource directories configured");
        return Ok(ExitCode::FAILURE);
    }

    let shutdown = supervisor.shutdown_handle();
    let Some(candidates) = gather_candidates(lists, &shutdown).await? else {
        listener.abort();
        shutdown.mark_stopped();
        warn!("Shutdown requested while measuring directories, nothing locked");
        return Ok(ExitCode::from(INTERRUPTED));
    };
    if candidates.is_empty() {
        error!("No valid directories found to lock");
        return Ok(ExitCode::FAILURE);
    }

    let run = supervisor
        .execute(candidates, budget, RunLimits::from_settings(settings))
        .await;
    listener.abort();

    if matches!(run.status, RunStatus::Succeeded | RunStatus::PartialFailure) {
        let memory_after = MemoryInfo::read()?;
        report::log_memory_statistics(
            &memory_before,
            &memory_after,
            settings.memory_limit_percent,
            budget,
            run.selection.total_selected_bytes,
        );
    }
    report::log_run_summary(&run);

    Ok(ExitCode::from(run.exit_code()))
}

async fn verify_sizes(config_dir: &Path, settings: &Settings) -> anyhow::Result<ExitCode> {
    let memory = MemoryInfo::read()?;
    let budget = budget_bytes(memory.total, settings.memory_limit_percent);

    let lists = ConfigLists::load(config_dir)?;
    if lists.is_empty() {
        error!("No applications or resource directories configured");
        return Ok(ExitCode::FAILURE);
    }

    let shutdown = ShutdownHandle::new(Arc::new(OrchestratorState::new()));
    let listener = spawn_signal_listener(shutdown.clone());
    let gathered = gather_candidates(lists, &shutdown).await;
    listener.abort();
    let Some(candidates) = gathered? else {
        shutdown.mark_stopped();
        warn!("Shutdown requested while measuring directories");
        return Ok(ExitCode::from(INTERRUPTED));
    };
    if candidates.is_empty() {
        error!("No valid directories found");
        return Ok(ExitCode::FAILURE);
    }
    let found = candidates.len();

    let catalog = DirectoryCatalog::from_entries(candidates);
    let selection = select(catalog.records(), budget);
    report::log_selection(&selection);
    report::log_verify_summary(&memory, &selection, found);

    Ok(ExitCode::SUCCESS)
}
