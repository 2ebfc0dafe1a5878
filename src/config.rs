//! Run configuration.

use std::time::Duration;

use serde::Serialize;

use crate::utils::trim_mount_point;

/// Expected captures per day at o2locktop's 5 second refresh.
pub const CYCLES_PER_DAY: f64 = 17280.0;
/// Default run length in days.
pub const DEFAULT_DAYS: f64 = 0.025;
/// Frames captured under load in one dynamic test.
pub const DYNAMIC_SAMPLES: usize = 6;
/// Dynamic tests run on cycles where `cycle % DYNAMIC_PERIOD == DYNAMIC_PHASE`.
pub const DYNAMIC_PERIOD: u64 = 10;
pub const DYNAMIC_PHASE: u64 = 2;
/// Files seeded into the mount point before the run.
pub const DEFAULT_SEED_FILES: usize = 1000;
pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_JOIN_GRACE: Duration = Duration::from_secs(5);

/// Everything a run needs to know, fixed for its lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    /// Rows per frame, matching o2locktop's `-l`.
    pub length: usize,
    pub mount_point: String,
    pub days: f64,
    /// Cluster nodes to load over ssh; empty means local mode.
    pub nodes: Vec<String>,
    /// Run the static test on a random tenth of the other cycles.
    pub static_test: bool,
    pub dynamic_samples: usize,
    pub seed_files: usize,
    pub ssh_user: String,
    /// How long to wait for the local load to stop before killing it.
    pub join_grace: Duration,
}

impl RunConfig {
    pub fn new(length: usize, mount_point: &str) -> Self {
        RunConfig {
            length,
            mount_point: trim_mount_point(mount_point).to_string(),
            days: DEFAULT_DAYS,
            nodes: Vec::new(),
            static_test: false,
            dynamic_samples: DYNAMIC_SAMPLES,
            seed_files: DEFAULT_SEED_FILES,
            ssh_user: DEFAULT_SSH_USER.to_string(),
            join_grace: DEFAULT_JOIN_GRACE,
        }
    }

    pub fn is_remote(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Number of capture cycles the day budget allows.
    pub fn cycle_budget(&self) -> f64 {
        (self.days * CYCLES_PER_DAY).max(0.0)
    }

    /// True once `cycles` completed captures exceed the budget.
    pub fn budget_exhausted(&self, cycles: u64) -> bool {
        cycles as f64 > self.cycle_budget()
    }

    pub fn is_dynamic_cycle(cycle: u64) -> bool {
        cycle % DYNAMIC_PERIOD == DYNAMIC_PHASE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new(10, "/mnt/ocfs2/");
        assert_eq!(config.mount_point, "/mnt/ocfs2");
        assert!(!config.is_remote());
        assert!(!config.static_test);
        assert_eq!(config.dynamic_samples, 6);
    }

    #[test]
    fn test_budget() {
        let config = RunConfig::new(10, "/mnt/ocfs2");
        // 0.025 days is 432 cycles.
        assert!(!config.budget_exhausted(432));
        assert!(config.budget_exhausted(433));

        let config = RunConfig {
            days: 1.0,
            ..RunConfig::new(10, "/mnt/ocfs2")
        };
        assert_eq!(config.cycle_budget(), 17280.0);

        let config = RunConfig {
            days: 0.0,
            ..RunConfig::new(10, "/mnt/ocfs2")
        };
        assert!(config.budget_exhausted(1));
    }

    #[test]
    fn test_dynamic_cycles() {
        let dynamic: Vec<u64> = (1..=30).filter(|c| RunConfig::is_dynamic_cycle(*c)).collect();
        assert_eq!(dynamic, vec![2, 12, 22]);
    }

    #[test]
    fn test_remote_mode() {
        let mut config = RunConfig::new(10, "/mnt/ocfs2");
        config.nodes.push("10.0.0.2".into());
        assert!(config.is_remote());
    }
}
