//! Invariant checks over captured TOTALs.
//!
//! The static check expects TOTAL to hold steady without load; the dynamic
//! checks expect it to rise while load runs. Local and remote dynamic checks
//! are kept separate: local passes on the first sample above the baseline,
//! remote compares the largest sample.

use std::fmt;

use serde::Serialize;
use tracing::{error, info};

/// Allowed drift between two unloaded captures.
pub const STATIC_TOLERANCE: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CheckKind {
    Static,
    DynamicLocal,
    DynamicRemote,
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckKind::Static => write!(f, "static test"),
            CheckKind::DynamicLocal => write!(f, "local mode dynamic test"),
            CheckKind::DynamicRemote => write!(f, "remote mode dynamic test"),
        }
    }
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckVerdict {
    pub kind: CheckKind,
    pub passed: bool,
    /// TOTAL before load (or the first static capture).
    pub baseline: u64,
    /// The value the verdict was decided on.
    pub observed: u64,
}

impl CheckVerdict {
    /// Report the verdict: passes at info, failures at error.
    pub fn log(&self) {
        if self.passed {
            info!(
                check = %self.kind,
                total1 = self.baseline,
                total2 = self.observed,
                "{} OK, total1 = {}, total2 = {}",
                self.kind,
                self.baseline,
                self.observed
            );
        } else {
            error!(
                check = %self.kind,
                total1 = self.baseline,
                total2 = self.observed,
                "{} failed, total1 = {}, total2 = {}",
                self.kind,
                self.baseline,
                self.observed
            );
        }
    }
}

/// Two unloaded captures must agree within ten percent.
pub fn static_check(total1: u64, total2: u64) -> CheckVerdict {
    let low = total1 as f64 * (1.0 - STATIC_TOLERANCE);
    let high = total1 as f64 * (1.0 + STATIC_TOLERANCE);
    let observed = total2 as f64;
    CheckVerdict {
        kind: CheckKind::Static,
        passed: low <= observed && observed <= high,
        baseline: total1,
        observed: total2,
    }
}

/// Passes on the first sample above the baseline.
///
/// A failure reports the last sample.
pub fn dynamic_local_check(baseline: u64, samples: &[u64]) -> CheckVerdict {
    match samples.iter().find(|&&sample| sample > baseline) {
        Some(&observed) => CheckVerdict {
            kind: CheckKind::DynamicLocal,
            passed: true,
            baseline,
            observed,
        },
        None => CheckVerdict {
            kind: CheckKind::DynamicLocal,
            passed: false,
            baseline,
            observed: samples.last().copied().unwrap_or(baseline),
        },
    }
}

/// Passes if the largest sample is above the baseline.
///
/// A failure reports the last sample.
pub fn dynamic_remote_check(baseline: u64, samples: &[u64]) -> CheckVerdict {
    let max = samples.iter().copied().max().unwrap_or(baseline);
    if max > baseline {
        CheckVerdict {
            kind: CheckKind::DynamicRemote,
            passed: true,
            baseline,
            observed: max,
        }
    } else {
        CheckVerdict {
            kind: CheckKind::DynamicRemote,
            passed: false,
            baseline,
            observed: samples.last().copied().unwrap_or(baseline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_within_tolerance() {
        assert!(static_check(200, 210).passed);
        assert!(static_check(200, 180).passed);
        assert!(static_check(200, 220).passed);
        assert!(static_check(0, 0).passed);
    }

    #[test]
    fn test_static_outside_tolerance() {
        let verdict = static_check(200, 230);
        assert!(!verdict.passed);
        assert_eq!(verdict.baseline, 200);
        assert_eq!(verdict.observed, 230);
        assert!(!static_check(200, 179).passed);
    }

    #[test]
    fn test_dynamic_local() {
        let verdict = dynamic_local_check(100, &[80, 90, 145, 70, 60, 100]);
        assert!(verdict.passed);
        assert_eq!(verdict.observed, 145);
        assert_eq!(verdict.kind, CheckKind::DynamicLocal);

        let verdict = dynamic_local_check(100, &[80, 90, 95, 70, 60, 100]);
        assert!(!verdict.passed);
        assert_eq!(verdict.observed, 100);
    }

    #[test]
    fn test_dynamic_local_reports_first_rise() {
        let verdict = dynamic_local_check(100, &[101, 500]);
        assert_eq!(verdict.observed, 101);
    }

    #[test]
    fn test_dynamic_remote() {
        let verdict = dynamic_remote_check(100, &[101, 500, 90]);
        assert!(verdict.passed);
        assert_eq!(verdict.observed, 500);
        assert_eq!(verdict.kind, CheckKind::DynamicRemote);

        let verdict = dynamic_remote_check(100, &[100, 20, 30]);
        assert!(!verdict.passed);
        assert_eq!(verdict.observed, 30);
    }

    #[test]
    fn test_local_and_remote_agree_on_pass_fail() {
        let cases: [&[u64]; 4] = [&[1, 2, 3], &[10, 10], &[11], &[]];
        for samples in cases {
            assert_eq!(
                dynamic_local_check(10, samples).passed,
                dynamic_remote_check(10, samples).passed,
                "samples {samples:?}"
            );
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CheckKind::DynamicLocal.to_string(), "local mode dynamic test");
    }
}
