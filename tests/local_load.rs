//! Local load against a scratch directory.

use std::thread;
use std::time::Duration;

use o2locktop_verify::load::{seed_files, LoadLauncher, LocalLauncher, StopOutcome};
use o2locktop_verify::remote::Host;
use tempfile::TempDir;

#[test]
fn test_local_load_starts_and_stops() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mount_point = dir.path().to_str().expect("utf-8 path");
    assert_eq!(seed_files(&Host::Local, mount_point, 20).expect("seed"), 20);

    let mut launcher = LocalLauncher::new(mount_point);
    let load = launcher.launch().expect("launch");
    thread::sleep(Duration::from_millis(300));
    assert_eq!(load.stop(Duration::from_secs(5)), StopOutcome::Joined);

    // A second dynamic test starts a fresh load.
    let load = launcher.launch().expect("relaunch");
    assert_eq!(load.stop(Duration::from_secs(5)), StopOutcome::Joined);
}
