use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};

use o2locktop_verify::config::{DEFAULT_DAYS, DEFAULT_SEED_FILES, DEFAULT_SSH_USER};
use o2locktop_verify::load::{seed_files, LoadLauncher, LocalLauncher, RemoteLauncher};
use o2locktop_verify::logging::{self, DEFAULT_LOG_PATH};
use o2locktop_verify::process::terminate_monitor;
use o2locktop_verify::remote::{Host, RemoteShell, SshShell};
use o2locktop_verify::stream::ReaderSource;
use o2locktop_verify::volume::{self, SetupError, VolumeInfo};
use o2locktop_verify::{
    FrameAssembler, Orchestrator, RunConfig, RunOutcome, RunSummary, ValidationConfig,
};

/// Validate o2locktop output read from stdin while loading the volume.
///
/// Typical use: `o2locktop -l 10 /mnt/ocfs2 | o2locktop-verify -l 10 /mnt/ocfs2`.
#[derive(Debug, Parser)]
#[command(name = "o2locktop-verify", version)]
struct Command {
    /// Rows per frame, as passed to o2locktop's -l.
    #[arg(short, long)]
    length: usize,
    /// Run length in days.
    #[arg(short, long, default_value_t = DEFAULT_DAYS)]
    days: f64,
    #[arg(short = 'o', long, default_value = DEFAULT_LOG_PATH)]
    log_file: PathBuf,
    /// Cluster node to load over ssh. Repeat for more nodes.
    #[arg(short = 'n', long = "node")]
    nodes: Vec<String>,
    /// Also run the static test on a random tenth of the cycles.
    #[arg(long)]
    static_test: bool,
    /// Number of <i>.test files to create in the mount point; 0 disables.
    #[arg(long, default_value_t = DEFAULT_SEED_FILES)]
    populate_files: usize,
    #[arg(long, default_value = DEFAULT_SSH_USER)]
    ssh_user: String,
    /// Seconds to wait for the local load to stop before killing it.
    #[arg(long, default_value = "5")]
    join_timeout_secs: u64,
    /// Also write the JSON run summary to this file.
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Mount point of the OCFS2 volume o2locktop is watching.
    mount_point: Option<String>,
}

#[derive(Debug, Serialize)]
struct RunReport {
    config: RunConfig,
    volume: VolumeInfo,
    outcome: RunOutcome,
    summary: RunSummary,
}

fn main() -> Result<()> {
    let opts = Command::parse();
    logging::init(&opts.log_file)?;

    run(opts)
}

fn run(opts: Command) -> Result<()> {
    let Some(mount_point) = opts.mount_point.as_deref() else {
        error!("you must input the mount point");
        terminate_monitor(None);
        return Err(SetupError::MissingMountPoint.into());
    };
    let config = RunConfig {
        days: opts.days,
        nodes: opts.nodes.clone(),
        static_test: opts.static_test,
        seed_files: opts.populate_files,
        ssh_user: opts.ssh_user.clone(),
        join_grace: Duration::from_secs(opts.join_timeout_secs),
        ..RunConfig::new(opts.length, mount_point)
    };

    let shell: Arc<dyn RemoteShell> = Arc::new(SshShell::new(config.ssh_user.as_str()));
    let host = match config.nodes.first() {
        Some(node) => Host::Remote {
            shell: shell.clone(),
            node: node.clone(),
        },
        None => Host::Local,
    };

    let volume = match volume::resolve(&host, &config.mount_point) {
        Ok(volume) => volume,
        Err(e) => {
            terminate_monitor(Some(&config.mount_point));
            return Err(e.into());
        }
    };

    if let Err(e) = seed_files(&host, &config.mount_point, config.seed_files) {
        warn!("failed to seed test files: {e:#}");
    }

    let launcher: Box<dyn LoadLauncher> = if config.is_remote() {
        Box::new(RemoteLauncher::new(
            shell,
            config.nodes.clone(),
            config.mount_point.as_str(),
        ))
    } else {
        Box::new(LocalLauncher::new(config.mount_point.as_str()))
    };

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Release))
        .context("Error setting Ctrl-C handler")?;

    let assembler = FrameAssembler::new(
        ValidationConfig::new(config.length),
        volume.uuid.as_str(),
        volume.max_inode,
    );
    let mut orchestrator =
        Orchestrator::new(config.clone(), assembler, ReaderSource::stdin(), launcher)
            .with_interrupt(interrupt);
    let outcome = orchestrator.run();

    if let RunOutcome::BudgetExhausted { .. } = outcome {
        let killed = terminate_monitor(Some(&config.mount_point));
        info!(killed, "stopped o2locktop");
    }

    let report = RunReport {
        config,
        volume,
        outcome,
        summary: orchestrator.into_summary(),
    };
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize summary")?;
    info!(
        cycles = report.outcome.cycles(),
        failed_checks = report.summary.failed_checks(),
        "run summary:\n{json}"
    );
    if let Some(path) = &opts.summary {
        fs::write(path, &json)
            .with_context(|| format!("Failed to write summary to {}", path.display()))?;
    }

    Ok(())
}
