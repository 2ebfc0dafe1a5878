//! Command execution on cluster nodes.
//!
//! [`SshShell`] drives the `ssh`/`scp` binaries. [`Host`] runs a shell command
//! either on this machine or on a remote node, so metadata lookups and file
//! seeding read the same in both modes.

use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Copy files to and run commands on cluster nodes.
pub trait RemoteShell: Send + Sync {
    /// Copy a local file to `remote_path` on `node`.
    fn copy_to(&self, node: &str, local: &Path, remote_path: &str) -> Result<()>;

    /// Run `command` on `node` and return its standard output.
    fn run(&self, node: &str, command: &str) -> Result<String>;
}

/// [`RemoteShell`] using the system `ssh` and `scp` clients.
#[derive(Debug, Clone)]
pub struct SshShell {
    user: String,
}

impl SshShell {
    pub fn new(user: impl Into<String>) -> Self {
        SshShell { user: user.into() }
    }

    fn target(&self, node: &str) -> String {
        format!("{}@{}", self.user, node)
    }
}

impl RemoteShell for SshShell {
    fn copy_to(&self, node: &str, local: &Path, remote_path: &str) -> Result<()> {
        let destination = format!("{}:{}", self.target(node), remote_path);
        debug!(node, local = %local.display(), remote_path, "scp");
        let output = Command::new("scp")
            .arg(local)
            .arg(&destination)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run scp to {node}"))?;
        check_status("scp", &output)?;
        Ok(())
    }

    fn run(&self, node: &str, command: &str) -> Result<String> {
        debug!(node, command, "ssh");
        let output = Command::new("ssh")
            .arg(self.target(node))
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run ssh to {node}"))?;
        check_status("ssh", &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn check_status(what: &str, output: &Output) -> Result<()> {
    if !output.status.success() {
        bail!(
            "{what} exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Where a shell command runs.
#[derive(Clone)]
pub enum Host {
    Local,
    Remote {
        shell: Arc<dyn RemoteShell>,
        node: String,
    },
}

impl Host {
    /// Run `command` through `sh -c` locally, or through the remote shell.
    pub fn run(&self, command: &str) -> Result<String> {
        match self {
            Host::Local => {
                debug!(command, "sh -c");
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .stdin(Stdio::null())
                    .output()
                    .with_context(|| format!("Failed to run '{command}'"))?;
                check_status(command, &output)?;
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Host::Remote { shell, node } => shell.run(node, command),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Host::Local => "localhost",
            Host::Remote { node, .. } => node,
        }
    }
}

/// Quote `arg` for a POSIX shell.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', r"'\''"))
}
