//! Findings recorded while a frame is assembled.
//!
//! Errors mark output that breaks an invariant of o2locktop's screen; the
//! frame they land on is invalid. Warnings mark output that is odd but still
//! usable (a short frame, an unknown lock type). Neither ever stops a run.

use std::fmt;

/// A frame's diagnostics.
#[derive(Debug, Default, Clone)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    /// No errors; warnings do not count.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of errors about the shape of the output.
    pub fn format_errors(&self) -> usize {
        self.errors.iter().filter(|e| e.is_format_error()).count()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    /// Record `error` while fewer than `limit` errors are kept.
    ///
    /// Past the limit the error is dropped, and the first drop leaves a single
    /// `TooManyErrors` warning. Returns false if the error was dropped.
    pub fn add_error_capped(&mut self, error: ValidationError, limit: usize) -> bool {
        if self.errors.len() < limit {
            self.errors.push(error);
            return true;
        }
        let already_noted = self
            .warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::TooManyErrors { .. }));
        if !already_noted {
            self.warnings
                .push(ValidationWarning::TooManyErrors { shown: limit });
        }
        false
    }
}

/// Validation error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A summary line split into the wrong number of tokens.
    FieldCount {
        line: String,
        expected: usize,
        got: usize,
    },
    /// A summary line had fewer tokens than the field it should carry.
    TooFewFields {
        line: String,
        min: usize,
        got: usize,
    },
    /// A summary counter could not be parsed.
    UnparsableCount { line: String, token: String },
    /// The title line names a different volume.
    VolumeMismatch { expected: String, got: String },
    /// The column header does not match the canonical header.
    HeaderMismatch { got: String },
    /// A row counter is negative.
    NegativeCounter { field: String, value: i64 },
    /// A row counter is not an integer.
    MalformedCounter { field: String, raw: String },
    /// A row inode is zero, negative or above the volume's inode count.
    InodeOutOfRange { inode: i64, max_inode: u64 },
    /// A row inode is not an integer.
    MalformedInode { raw: String },
    /// The header never completed within the skipped line budget.
    IncompleteFrame { state: String, skipped: usize },
}

impl ValidationError {
    /// True for errors about the shape of the output rather than its values.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            ValidationError::FieldCount { .. }
                | ValidationError::TooFewFields { .. }
                | ValidationError::UnparsableCount { .. }
                | ValidationError::MalformedCounter { .. }
                | ValidationError::MalformedInode { .. }
                | ValidationError::IncompleteFrame { .. }
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldCount {
                line,
                expected,
                got,
            } => {
                write!(
                    f,
                    "{line} line: expected {expected} fields, got {got}"
                )
            }
            ValidationError::TooFewFields { line, min, got } => {
                write!(f, "{line} line: expected at least {min} fields, got {got}")
            }
            ValidationError::UnparsableCount { line, token } => {
                write!(f, "{line} line: cannot parse count '{token}'")
            }
            ValidationError::VolumeMismatch { expected, got } => {
                write!(f, "uuid mismatch: expected {expected}, got {got}")
            }
            ValidationError::HeaderMismatch { got } => {
                write!(f, "column header mismatch: '{got}'")
            }
            ValidationError::NegativeCounter { field, value } => {
                write!(f, "{field}: negative value {value}")
            }
            ValidationError::MalformedCounter { field, raw } => {
                write!(f, "{field}: malformed value '{raw}'")
            }
            ValidationError::InodeOutOfRange { inode, max_inode } => {
                write!(f, "inode {inode} outside (0, {max_inode}]")
            }
            ValidationError::MalformedInode { raw } => {
                write!(f, "inode: malformed value '{raw}'")
            }
            ValidationError::IncompleteFrame { state, skipped } => {
                write!(
                    f,
                    "frame incomplete: skipped {skipped} lines waiting in {state}"
                )
            }
        }
    }
}

/// Validation warning types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// Fewer data rows than requested.
    ShortFrame { expected: usize, got: usize },
    /// Lines skipped while waiting for a header line.
    SkippedLines { state: String, count: usize },
    /// A row carries a lock type tag o2locktop is not known to print.
    UnknownLockType { lock_type: String, inode: String },
    /// Too many errors in one frame - only the first N were kept.
    TooManyErrors { shown: usize },
    /// The input ended while rows were being read.
    EndedInRows { got: usize },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::ShortFrame { expected, got } => {
                write!(f, "frame has {got} rows, expected {expected}")
            }
            ValidationWarning::SkippedLines { state, count } => {
                write!(f, "skipped {count} lines waiting in {state}")
            }
            ValidationWarning::UnknownLockType { lock_type, inode } => {
                write!(f, "inode {inode}: unknown lock type '{lock_type}'")
            }
            ValidationWarning::TooManyErrors { shown } => {
                write!(f, "showing first {shown} errors, more exist")
            }
            ValidationWarning::EndedInRows { got } => {
                write!(f, "input ended after {got} rows")
            }
        }
    }
}
