//! Per-row invariant checks.
//!
//! A lock statistics row is valid when its inode lies in `(0, max_inode]` and
//! every counter is a non-negative integer. Failures are recorded on the row;
//! they never stop the frame from accumulating further rows.

use tracing::{error, warn};

use super::config::KNOWN_LOCK_TYPES;
use super::result::{ValidationError, ValidationWarning};
use crate::classify::RowTokens;

/// Counter columns in the order o2locktop prints them after TYPE and INO.
pub const COUNTER_NAMES: [&str; 6] = [
    "EXNUM",
    "EXTIME(us)",
    "EXAVG(us)",
    "PRNUM",
    "PRTIME(us)",
    "PRAVG(us)",
];

/// A data row together with the outcome of checking it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    pub tokens: RowTokens,
    /// Parsed inode, if it was an integer.
    pub inode: Option<i64>,
    /// Parsed counters in [`COUNTER_NAMES`] order.
    pub counters: [Option<i64>; 6],
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidatedRow {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn lock_type(&self) -> &str {
        self.tokens.lock_type()
    }
}

/// Check one row against the volume's inode bound.
pub fn validate_row(tokens: RowTokens, max_inode: u64) -> ValidatedRow {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let mut counters = [None; 6];
    for (slot, (name, raw)) in counters
        .iter_mut()
        .zip(COUNTER_NAMES.iter().zip(tokens.counters()))
    {
        match raw.parse::<i64>() {
            Ok(value) if value < 0 => {
                error!(
                    field = name,
                    value, "got a negative number in the output"
                );
                errors.push(ValidationError::NegativeCounter {
                    field: name.to_string(),
                    value,
                });
                *slot = Some(value);
            }
            Ok(value) => *slot = Some(value),
            Err(_) => {
                error!(field = name, raw = %raw, "got a malformed lock number in the output");
                errors.push(ValidationError::MalformedCounter {
                    field: name.to_string(),
                    raw: raw.clone(),
                });
            }
        }
    }

    let inode = match tokens.inode().parse::<i64>() {
        Ok(inode) => {
            if inode <= 0 || inode as u64 > max_inode {
                error!(inode, max_inode, "inode out of range");
                errors.push(ValidationError::InodeOutOfRange { inode, max_inode });
            }
            Some(inode)
        }
        Err(_) => {
            error!(raw = tokens.inode(), "malformed inode");
            errors.push(ValidationError::MalformedInode {
                raw: tokens.inode().to_string(),
            });
            None
        }
    };

    if !KNOWN_LOCK_TYPES.contains(&tokens.lock_type()) {
        warn!(
            lock_type = tokens.lock_type(),
            inode = tokens.inode(),
            "unknown lock type"
        );
        warnings.push(ValidationWarning::UnknownLockType {
            lock_type: tokens.lock_type().to_string(),
            inode: tokens.inode().to_string(),
        });
    }

    ValidatedRow {
        tokens,
        inode,
        counters,
        errors,
        warnings,
    }
}
