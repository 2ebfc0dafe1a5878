use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use workerpool::thunk::{Thunk, ThunkWorker};
use workerpool::Pool;

use super::{listing_script, LoadLauncher, RunningLoad, StopOutcome, REMOTE_ITERATIONS};
use crate::remote::{shell_quote, RemoteShell};

/// Where the listing script lands on every node.
pub const REMOTE_SCRIPT_PATH: &str = "/tmp/o2locktop_verify_load.sh";

type NodeResult = (String, Result<()>);

/// Launches a bounded listing script on every cluster node.
pub struct RemoteLauncher {
    shell: Arc<dyn RemoteShell>,
    nodes: Vec<String>,
    mount_point: String,
    pool: Pool<ThunkWorker<NodeResult>>,
}

impl RemoteLauncher {
    pub fn new(
        shell: Arc<dyn RemoteShell>,
        nodes: Vec<String>,
        mount_point: impl Into<String>,
    ) -> Self {
        let pool = Pool::new(nodes.len().max(1));
        RemoteLauncher {
            shell,
            nodes,
            mount_point: mount_point.into(),
            pool,
        }
    }

    fn write_script(&self) -> Result<PathBuf> {
        let path =
            env::temp_dir().join(format!("o2locktop_verify_load.{}.sh", process::id()));
        fs::write(&path, listing_script(&self.mount_point, Some(REMOTE_ITERATIONS)))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

fn run_on_node(shell: &dyn RemoteShell, node: &str, script: &Path) -> Result<()> {
    shell.copy_to(node, script, REMOTE_SCRIPT_PATH)?;
    let remote = shell_quote(REMOTE_SCRIPT_PATH);
    shell.run(node, &format!("chmod +x {remote} && {remote}"))?;
    Ok(())
}

impl LoadLauncher for RemoteLauncher {
    fn launch(&mut self) -> Result<Box<dyn RunningLoad>> {
        let script = self.write_script()?;
        let (tx, results) = mpsc::channel();
        for node in &self.nodes {
            let shell = self.shell.clone();
            let node = node.clone();
            let script = script.clone();
            self.pool.execute_to(
                tx.clone(),
                Thunk::of(move || {
                    let result = run_on_node(shell.as_ref(), &node, &script);
                    (node, result)
                }),
            );
        }
        info!(nodes = ?self.nodes, "started remote load");
        Ok(Box::new(RemoteLoad {
            results,
            pending: self.nodes.len(),
        }))
    }
}

/// Listing scripts in flight on the cluster nodes.
///
/// The scripts stop by themselves after a fixed number of rounds; stopping
/// only collects whatever has finished.
pub struct RemoteLoad {
    results: Receiver<NodeResult>,
    pending: usize,
}

impl RemoteLoad {
    fn drain(&mut self) {
        while let Ok((node, result)) = self.results.try_recv() {
            self.pending = self.pending.saturating_sub(1);
            match result {
                Ok(()) => info!(node = %node, "remote load finished"),
                Err(e) => error!(node = %node, "remote load failed: {e:#}"),
            }
        }
    }
}

impl RunningLoad for RemoteLoad {
    fn stop(mut self: Box<Self>, _grace: Duration) -> StopOutcome {
        self.drain();
        if self.pending > 0 {
            warn!(pending = self.pending, "remote load still running, leaving it to finish");
        }
        StopOutcome::Detached {
            pending: self.pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeShell {
        calls: Mutex<Vec<String>>,
        fail_node: Option<String>,
    }

    impl RemoteShell for FakeShell {
        fn copy_to(&self, node: &str, local: &Path, remote_path: &str) -> Result<()> {
            let script = fs::read_to_string(local)?;
            assert!(script.contains("for i in $(seq 1 80)"));
            self.calls
                .lock()
                .unwrap()
                .push(format!("copy {node} {remote_path}"));
            Ok(())
        }

        fn run(&self, node: &str, command: &str) -> Result<String> {
            if self.fail_node.as_deref() == Some(node) {
                anyhow::bail!("connection refused");
            }
            self.calls.lock().unwrap().push(format!("run {node} {command}"));
            Ok(String::new())
        }
    }

    #[test]
    fn test_launch_runs_script_on_every_node() {
        let shell = Arc::new(FakeShell::default());
        let nodes = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        let mut launcher = RemoteLauncher::new(shell.clone(), nodes, "/mnt/ocfs2");
        let running = launcher.launch().expect("launch");
        launcher.pool.join();
        assert_eq!(
            running.stop(Duration::from_secs(1)),
            StopOutcome::Detached { pending: 0 }
        );

        let calls = shell.calls.lock().unwrap();
        assert_eq!(calls.len(), 4);
        assert!(calls.contains(&format!("copy 10.0.0.1 {REMOTE_SCRIPT_PATH}")));
        assert!(calls.contains(&format!(
            "run 10.0.0.2 chmod +x '{REMOTE_SCRIPT_PATH}' && '{REMOTE_SCRIPT_PATH}'"
        )));
    }

    #[test]
    fn test_stop_before_nodes_report() {
        let (_tx, results) = mpsc::channel();
        let load = Box::new(RemoteLoad {
            results,
            pending: 3,
        });
        assert_eq!(
            load.stop(Duration::from_secs(1)),
            StopOutcome::Detached { pending: 3 }
        );
    }

    #[test]
    fn test_failed_node_is_reported() {
        let shell = Arc::new(FakeShell {
            fail_node: Some("10.0.0.2".to_string()),
            ..Default::default()
        });
        let nodes = vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()];
        let mut launcher = RemoteLauncher::new(shell, nodes, "/mnt/ocfs2");
        let running = launcher.launch().expect("launch");
        launcher.pool.join();
        assert_eq!(
            running.stop(Duration::from_secs(1)),
            StopOutcome::Detached { pending: 0 }
        );
    }
}
