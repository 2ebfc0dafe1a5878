//! Validation of o2locktop output.
//!
//! Findings are plain data: each frame carries a [`ValidationResult`] with the
//! errors and warnings seen while it was assembled, and each data row carries
//! its own list. Nothing in here aborts a run.
//!
//! # Entry Points
//!
//! - [`validate_row`] - Check one lock statistics row
//! - [`ValidationConfig`] - Assembly and reporting limits

mod config;
mod result;
mod row;

// Re-export configuration
pub use config::{ValidationConfig, KNOWN_LOCK_TYPES};

// Re-export result types
pub use result::{ValidationError, ValidationResult, ValidationWarning};

// Re-export row checks
pub use row::{validate_row, ValidatedRow, COUNTER_NAMES};
