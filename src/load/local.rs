use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use super::{
    cancel_flag, listing_script, CancelHandle, CancelWatch, LoadLauncher, RunningLoad,
    StopOutcome,
};

const SUPERVISOR_POLL: Duration = Duration::from_millis(20);

/// Launches an endless listing loop against a local mount point.
#[derive(Debug, Clone)]
pub struct LocalLauncher {
    mount_point: String,
}

impl LocalLauncher {
    pub fn new(mount_point: impl Into<String>) -> Self {
        LocalLauncher {
            mount_point: mount_point.into(),
        }
    }
}

impl LoadLauncher for LocalLauncher {
    fn launch(&mut self) -> Result<Box<dyn RunningLoad>> {
        let script = listing_script(&self.mount_point, None);
        let load = LocalLoad::spawn(&script)?;
        info!(mount_point = %self.mount_point, pid = load.pid, "started local load");
        Ok(Box::new(load))
    }
}

/// A shell script running in its own process group, watched by a supervisor
/// thread.
///
/// The supervisor kills the whole group once the cancel flag clears, so the
/// `ls`/`sleep` children go down with the shell.
pub struct LocalLoad {
    pid: u32,
    cancel: CancelHandle,
    done: Receiver<()>,
    supervisor: JoinHandle<()>,
}

impl LocalLoad {
    /// Start `script` under `sh -c`.
    pub fn spawn(script: &str) -> Result<Self> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(script)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn local load")?;
        let pid = child.id();

        let (cancel, watch) = cancel_flag();
        let (done_tx, done) = mpsc::channel();
        let supervisor = thread::Builder::new()
            .name("local_load".to_string())
            .spawn(move || {
                supervise(child, watch);
                let _ = done_tx.send(());
            })
            .context("Failed to spawn load supervisor")?;

        Ok(LocalLoad {
            pid,
            cancel,
            done,
            supervisor,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }
}

fn supervise(mut child: Child, watch: CancelWatch) {
    let pid = child.id();
    while watch.is_running() {
        match child.try_wait() {
            Ok(Some(status)) => {
                warn!(pid, %status, "local load exited before it was stopped");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(pid, "failed to poll local load: {e}");
                break;
            }
        }
        thread::sleep(SUPERVISOR_POLL);
    }
    kill_group(pid);
    match child.wait() {
        Ok(status) => debug!(pid, %status, "local load reaped"),
        Err(e) => warn!(pid, "failed to reap local load: {e}"),
    }
}

fn kill_group(pid: u32) {
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(pid, "failed to kill load process group: {e}"),
    }
}

impl RunningLoad for LocalLoad {
    fn stop(self: Box<Self>, grace: Duration) -> StopOutcome {
        let LocalLoad {
            pid,
            cancel,
            done,
            supervisor,
        } = *self;
        cancel.cancel();

        let outcome = match done.recv_timeout(grace) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => StopOutcome::Joined,
            Err(RecvTimeoutError::Timeout) => {
                warn!(pid, ?grace, "local load did not stop in time, killing it");
                kill_group(pid);
                match done.recv_timeout(grace) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => StopOutcome::Killed,
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(pid, "abandoning local load supervisor");
                        return StopOutcome::Detached { pending: 1 };
                    }
                }
            }
        };
        if supervisor.join().is_err() {
            warn!(pid, "local load supervisor panicked");
        }
        info!(pid, ?outcome, "stopped local load");
        outcome
    }
}
