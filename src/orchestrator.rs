//! The test loop.
//!
//! Every cycle captures one frame. Cycles where
//! [`RunConfig::is_dynamic_cycle`] holds run the dynamic test first; with
//! `static_test` enabled, a random tenth of the other cycles run the static
//! test. The run ends when the day budget is spent, the input closes, or an
//! interrupt arrives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::checks::{
    dynamic_local_check, dynamic_remote_check, static_check, CheckKind, CheckVerdict,
};
use crate::config::RunConfig;
use crate::frame::{FrameAssembler, FrameOutcome};
use crate::load::{LoadLauncher, StopOutcome};
use crate::stream::LineSource;

/// Result of one capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// The session TOTAL after the capture.
    Total(u64),
    Closed,
}

/// Result of one static or dynamic test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestResult {
    Verdict(CheckVerdict),
    /// The load could not be started.
    Skipped,
    StreamClosed,
}

/// Why the run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunOutcome {
    BudgetExhausted { cycles: u64 },
    StreamClosed { cycles: u64 },
    Interrupted { cycles: u64 },
}

impl RunOutcome {
    pub fn cycles(&self) -> u64 {
        match *self {
            RunOutcome::BudgetExhausted { cycles }
            | RunOutcome::StreamClosed { cycles }
            | RunOutcome::Interrupted { cycles } => cycles,
        }
    }
}

/// Counters collected over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub frames: u64,
    pub incomplete_frames: u64,
    pub invalid_rows: u64,
    pub frame_errors: u64,
    /// Errors about the shape of the output, a subset of `frame_errors`.
    pub format_errors: u64,
    pub frame_warnings: u64,
    pub static_passed: u64,
    pub static_failed: u64,
    pub dynamic_passed: u64,
    pub dynamic_failed: u64,
    pub load_failures: u64,
    pub last_total: u64,
}

impl RunSummary {
    pub fn failed_checks(&self) -> u64 {
        self.static_failed + self.dynamic_failed
    }

    fn record_verdict(&mut self, verdict: &CheckVerdict) {
        let counter = match (verdict.kind, verdict.passed) {
            (CheckKind::Static, true) => &mut self.static_passed,
            (CheckKind::Static, false) => &mut self.static_failed,
            (_, true) => &mut self.dynamic_passed,
            (_, false) => &mut self.dynamic_failed,
        };
        *counter += 1;
    }
}

/// Drives captures and checks over one input stream.
pub struct Orchestrator<S> {
    config: RunConfig,
    assembler: FrameAssembler,
    source: S,
    launcher: Box<dyn LoadLauncher>,
    interrupt: Option<Arc<AtomicBool>>,
    rng: StdRng,
    last_total: u64,
    cycles: u64,
    summary: RunSummary,
}

impl<S: LineSource> Orchestrator<S> {
    pub fn new(
        config: RunConfig,
        assembler: FrameAssembler,
        source: S,
        launcher: Box<dyn LoadLauncher>,
    ) -> Self {
        Orchestrator {
            config,
            assembler,
            source,
            launcher,
            interrupt: None,
            rng: StdRng::from_os_rng(),
            last_total: 0,
            cycles: 0,
            summary: RunSummary::default(),
        }
    }

    /// Stop at the next cycle boundary once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Fix the static test sampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn last_total(&self) -> u64 {
        self.last_total
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    /// Capture one frame and return the session TOTAL.
    ///
    /// A frame without a parsable TOTAL leaves the previous value in place.
    pub fn capture_total(&mut self) -> Capture {
        let outcome = self.assembler.capture(&mut self.source);
        let frame = match &outcome {
            FrameOutcome::StreamClosed => {
                info!("input closed");
                return Capture::Closed;
            }
            FrameOutcome::Complete(frame) => frame,
            FrameOutcome::Incomplete { frame, stalled_in } => {
                warn!(state = %stalled_in, "frame incomplete");
                self.summary.incomplete_frames += 1;
                frame
            }
        };

        self.summary.frames += 1;
        self.summary.invalid_rows += frame.invalid_rows() as u64;
        self.summary.frame_errors += frame.diagnostics.errors.len() as u64;
        self.summary.format_errors += frame.diagnostics.format_errors() as u64;
        self.summary.frame_warnings += frame.diagnostics.warnings.len() as u64;
        match frame.total {
            Some(total) => self.last_total = total,
            None => debug!(last_total = self.last_total, "frame without TOTAL"),
        }
        self.summary.last_total = self.last_total;
        debug!(
            total = self.last_total,
            rows = frame.rows.len(),
            valid = frame.is_valid(),
            "captured frame"
        );
        Capture::Total(self.last_total)
    }

    /// Two captures without load; TOTAL must hold within ten percent.
    pub fn run_static(&mut self) -> TestResult {
        let Capture::Total(total1) = self.capture_total() else {
            return TestResult::StreamClosed;
        };
        let Capture::Total(total2) = self.capture_total() else {
            return TestResult::StreamClosed;
        };
        let verdict = static_check(total1, total2);
        verdict.log();
        self.summary.record_verdict(&verdict);
        TestResult::Verdict(verdict)
    }

    /// Baseline capture, then captures under load; TOTAL must rise.
    ///
    /// The load is stopped before returning, including when the input closes
    /// mid-test.
    pub fn run_dynamic(&mut self) -> TestResult {
        let Capture::Total(baseline) = self.capture_total() else {
            return TestResult::StreamClosed;
        };
        let load = match self.launcher.launch() {
            Ok(load) => load,
            Err(e) => {
                error!("failed to start load, skipping dynamic test: {e:#}");
                self.summary.load_failures += 1;
                return TestResult::Skipped;
            }
        };

        let mut samples = Vec::with_capacity(self.config.dynamic_samples);
        let mut closed = false;
        for _ in 0..self.config.dynamic_samples {
            match self.capture_total() {
                Capture::Total(total) => samples.push(total),
                Capture::Closed => {
                    closed = true;
                    break;
                }
            }
        }

        match load.stop(self.config.join_grace) {
            StopOutcome::Killed => warn!("load had to be killed"),
            StopOutcome::Joined | StopOutcome::Detached { .. } => {}
        }
        if closed {
            return TestResult::StreamClosed;
        }

        debug!(baseline, ?samples, "dynamic samples");
        let verdict = if self.config.is_remote() {
            dynamic_remote_check(baseline, &samples)
        } else {
            dynamic_local_check(baseline, &samples)
        };
        verdict.log();
        self.summary.record_verdict(&verdict);
        TestResult::Verdict(verdict)
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    }

    fn wants_static(&mut self) -> bool {
        self.config.static_test && self.rng.random_range(1..=10) == 2
    }

    /// Run cycles until the budget is spent, the input closes or an interrupt
    /// arrives.
    pub fn run(&mut self) -> RunOutcome {
        info!(
            length = self.config.length,
            mount_point = %self.config.mount_point,
            uuid = self.assembler.volume_uuid(),
            max_inode = self.assembler.max_inode(),
            budget = self.config.cycle_budget(),
            remote = self.config.is_remote(),
            "starting test run"
        );
        loop {
            if self.interrupted() {
                info!(cycles = self.cycles, "interrupted");
                return RunOutcome::Interrupted {
                    cycles: self.cycles,
                };
            }
            self.cycles += 1;

            let test = if RunConfig::is_dynamic_cycle(self.cycles) {
                Some(self.run_dynamic())
            } else if self.wants_static() {
                Some(self.run_static())
            } else {
                None
            };
            if test == Some(TestResult::StreamClosed) {
                return RunOutcome::StreamClosed {
                    cycles: self.cycles,
                };
            }

            if self.capture_total() == Capture::Closed {
                return RunOutcome::StreamClosed {
                    cycles: self.cycles,
                };
            }

            if self.config.budget_exhausted(self.cycles) {
                info!(cycles = self.cycles, total = self.last_total, "run budget exhausted");
                return RunOutcome::BudgetExhausted {
                    cycles: self.cycles,
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::RunningLoad;
    use crate::stream::StreamLine;
    use crate::validation::ValidationConfig;
    use anyhow::bail;
    use std::collections::VecDeque;
    use std::time::Duration;

    const UUID: &str = "7F3A9C5E21B04D6C8E1F2A3B4C5D6E7F";

    struct Lines(VecDeque<String>);

    impl LineSource for Lines {
        fn next_line(&mut self) -> StreamLine {
            match self.0.pop_front() {
                Some(line) => StreamLine::Line(line),
                None => StreamLine::Closed,
            }
        }

        fn unread(&mut self, line: String) {
            self.0.push_front(line);
        }
    }

    fn frame(acquisitions: u64) -> Vec<String> {
        vec![
            format!("o2locktop - ocfs2 volume {UUID}"),
            format!("lock acquisitions in last 5s: {acquisitions} EX: 1 PR: 2"),
            "active lock resources: 10".to_string(),
            String::new(),
            "TYPE INO EXNUM EXTIME(us) EXAVG(us) PRNUM PRTIME(us) PRAVG(us)".to_string(),
            "M 1234 1 2 3 4 5 6".to_string(),
        ]
    }

    fn stream(acquisitions: &[u64]) -> Lines {
        Lines(acquisitions.iter().flat_map(|a| frame(*a)).collect())
    }

    struct NoLoad;

    impl RunningLoad for NoLoad {
        fn stop(self: Box<Self>, _grace: Duration) -> StopOutcome {
            StopOutcome::Joined
        }
    }

    #[derive(Default)]
    struct CountingLauncher {
        launched: usize,
        fail: bool,
    }

    impl LoadLauncher for CountingLauncher {
        fn launch(&mut self) -> anyhow::Result<Box<dyn RunningLoad>> {
            if self.fail {
                bail!("no shell");
            }
            self.launched += 1;
            Ok(Box::new(NoLoad))
        }
    }

    fn orchestrator(config: RunConfig, lines: Lines) -> Orchestrator<Lines> {
        orchestrator_with(config, lines, CountingLauncher::default())
    }

    fn orchestrator_with(
        config: RunConfig,
        lines: Lines,
        launcher: CountingLauncher,
    ) -> Orchestrator<Lines> {
        let assembler =
            FrameAssembler::new(ValidationConfig::new(config.length), UUID, 1_000_000);
        Orchestrator::new(config, assembler, lines, Box::new(launcher)).with_seed(7)
    }

    #[test]
    fn test_capture_total_adds_one() {
        let mut orch = orchestrator(RunConfig::new(0, "/mnt/ocfs2"), stream(&[99, 4]));
        assert_eq!(orch.capture_total(), Capture::Total(100));
        assert_eq!(orch.capture_total(), Capture::Total(5));
        assert_eq!(orch.capture_total(), Capture::Closed);
        assert_eq!(orch.summary().frames, 2);
        assert_eq!(orch.summary().last_total, 5);
    }

    #[test]
    fn test_format_errors_are_counted() {
        let mut lines = VecDeque::from(frame(99));
        lines[1] = "lock acquisitions: 99".to_string();
        lines.extend(frame(4));
        let mut orch = orchestrator(RunConfig::new(0, "/mnt/ocfs2"), Lines(lines));

        // The broken second line is skipped until the next frame supplies one.
        assert_eq!(orch.capture_total(), Capture::Total(5));
        assert_eq!(orch.summary().frame_errors, 1);
        assert_eq!(orch.summary().format_errors, 1);
    }

    #[test]
    fn test_static() {
        let mut orch = orchestrator(RunConfig::new(0, "/mnt/ocfs2"), stream(&[199, 209]));
        match orch.run_static() {
            TestResult::Verdict(v) => assert!(v.passed, "{v:?}"),
            other => panic!("unexpected {other:?}"),
        }

        let mut orch = orchestrator(RunConfig::new(0, "/mnt/ocfs2"), stream(&[199, 229]));
        match orch.run_static() {
            TestResult::Verdict(v) => {
                assert!(!v.passed);
                assert_eq!((v.baseline, v.observed), (200, 230));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(orch.summary().static_failed, 1);
    }

    #[test]
    fn test_dynamic_local() {
        let config = RunConfig::new(0, "/mnt/ocfs2");
        let mut orch = orchestrator(config.clone(), stream(&[99, 79, 89, 144, 69, 59, 99]));
        match orch.run_dynamic() {
            TestResult::Verdict(v) => {
                assert!(v.passed);
                assert_eq!(v.kind, CheckKind::DynamicLocal);
                assert_eq!(v.observed, 145);
            }
            other => panic!("unexpected {other:?}"),
        }

        let mut orch = orchestrator(config, stream(&[99, 79, 89, 94, 69, 59, 99]));
        match orch.run_dynamic() {
            TestResult::Verdict(v) => assert!(!v.passed),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(orch.summary().dynamic_failed, 1);
    }

    #[test]
    fn test_dynamic_remote_uses_max() {
        let mut config = RunConfig::new(0, "/mnt/ocfs2");
        config.nodes = vec!["10.0.0.2".into()];
        let mut orch = orchestrator(config, stream(&[99, 100, 499, 89, 0, 0, 0]));
        match orch.run_dynamic() {
            TestResult::Verdict(v) => {
                assert!(v.passed);
                assert_eq!(v.kind, CheckKind::DynamicRemote);
                assert_eq!(v.observed, 500);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dynamic_closed_mid_test() {
        let mut orch = orchestrator(RunConfig::new(0, "/mnt/ocfs2"), stream(&[99, 120]));
        assert_eq!(orch.run_dynamic(), TestResult::StreamClosed);
    }

    #[test]
    fn test_dynamic_skipped_without_load() {
        let launcher = CountingLauncher {
            fail: true,
            ..Default::default()
        };
        let mut orch = orchestrator_with(RunConfig::new(0, "/mnt/ocfs2"), stream(&[99]), launcher);
        assert_eq!(orch.run_dynamic(), TestResult::Skipped);
        assert_eq!(orch.summary().load_failures, 1);
    }

    #[test]
    fn test_run_until_closed() {
        let mut orch = orchestrator(RunConfig::new(0, "/mnt/ocfs2"), stream(&[1, 2, 3]));
        // Cycle 1 captures one frame, cycle 2 starts a dynamic test and runs dry.
        assert_eq!(orch.run(), RunOutcome::StreamClosed { cycles: 2 });
    }

    #[test]
    fn test_run_until_budget() {
        let config = RunConfig {
            days: 0.0,
            ..RunConfig::new(0, "/mnt/ocfs2")
        };
        let mut orch = orchestrator(config, stream(&[1, 2, 3]));
        assert_eq!(orch.run(), RunOutcome::BudgetExhausted { cycles: 1 });
        assert_eq!(orch.last_total(), 2);
    }

    #[test]
    fn test_run_interrupted() {
        let flag = Arc::new(AtomicBool::new(true));
        let mut orch =
            orchestrator(RunConfig::new(0, "/mnt/ocfs2"), stream(&[1])).with_interrupt(flag);
        assert_eq!(orch.run(), RunOutcome::Interrupted { cycles: 0 });
        assert_eq!(orch.summary().frames, 0);
    }
}
