//! Synthetic filesystem load.
//!
//! A dynamic test needs lock traffic on the monitored volume while frames are
//! being captured. Listing the mount point with `ls -l` stats every inode in
//! it, which takes a cluster lock per inode.
//!
//! - [`LocalLauncher`] runs an endless listing loop on this machine until told
//!   to stop through a [`CancelHandle`].
//! - [`RemoteLauncher`] copies a bounded listing script to every node and
//!   runs it there; those runs end by themselves.
//!
//! Launching never blocks: the orchestrator keeps reading frames while the
//! load runs.

mod local;
mod remote;

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

pub use local::{LocalLauncher, LocalLoad};
pub use remote::{RemoteLauncher, RemoteLoad, REMOTE_SCRIPT_PATH};

use crate::remote::{shell_quote, Host};

/// Pause between two listings.
pub const LISTING_PERIOD: Duration = Duration::from_millis(100);
/// Listings a remote script performs before it exits.
pub const REMOTE_ITERATIONS: u32 = 80;

/// Writer half of a load's run flag. Owned by whoever started the load.
///
/// Not `Clone`: a load has a single writer.
#[derive(Debug)]
pub struct CancelHandle(Arc<AtomicBool>);

/// Reader half of a load's run flag.
#[derive(Debug, Clone)]
pub struct CancelWatch(Arc<AtomicBool>);

/// A fresh flag in the running state.
pub fn cancel_flag() -> (CancelHandle, CancelWatch) {
    let flag = Arc::new(AtomicBool::new(true));
    (CancelHandle(flag.clone()), CancelWatch(flag))
}

impl CancelHandle {
    /// Ask the load to stop. Idempotent.
    pub fn cancel(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CancelWatch {
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How a load ended when it was stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The load stopped within the grace period.
    Joined,
    /// The grace period ran out and the load was killed.
    Killed,
    /// The load runs to completion on its own; `pending` runs had not
    /// reported back yet.
    Detached { pending: usize },
}

/// A load that is currently generating traffic.
pub trait RunningLoad {
    /// Stop the load, waiting at most `grace` before forcing it.
    fn stop(self: Box<Self>, grace: Duration) -> StopOutcome;
}

/// Starts loads for dynamic tests.
pub trait LoadLauncher {
    /// Start a load and return without waiting for it.
    fn launch(&mut self) -> Result<Box<dyn RunningLoad>>;
}

/// Shell script that lists `mount_point` every [`LISTING_PERIOD`], forever or
/// for `iterations` rounds.
pub fn listing_script(mount_point: &str, iterations: Option<u32>) -> String {
    let mut script = String::from("#!/bin/sh\n");
    match iterations {
        Some(n) => script.push_str(&format!("for i in $(seq 1 {n})\n")),
        None => script.push_str("while true\n"),
    }
    script.push_str("do\n");
    script.push_str(&format!(
        "ls -l {} > /dev/null\n",
        shell_quote(mount_point)
    ));
    script.push_str(&format!("sleep {}\n", LISTING_PERIOD.as_secs_f64()));
    script.push_str("done\n");
    script
}

/// Create `count` empty files named `<i>.test` in `mount_point`, so that
/// listings touch many inode locks.
///
/// Existing files are left alone. Returns the number of files created, or
/// `count` for a remote host where that is not reported.
pub fn seed_files(host: &Host, mount_point: &str, count: usize) -> Result<usize> {
    if count == 0 {
        return Ok(0);
    }
    let created = match host {
        Host::Local => {
            let mut created = 0;
            for i in 0..count {
                let path = Path::new(mount_point).join(format!("{i}.test"));
                match OpenOptions::new().write(true).create_new(true).open(&path) {
                    Ok(_) => created += 1,
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                    Err(e) => {
                        return Err(e)
                            .with_context(|| format!("Failed to create {}", path.display()))
                    }
                }
            }
            created
        }
        Host::Remote { .. } => {
            host.run(&format!(
                "cd {} && for i in $(seq 0 {}); do touch $i.test; done",
                shell_quote(mount_point),
                count - 1
            ))
            .with_context(|| format!("Failed to seed files on {}", host.name()))?;
            count
        }
    };
    info!(host = host.name(), mount_point, created, "seeded test files");
    Ok(created)
}
