//! Frames: one refresh of o2locktop's screen.
//!
//! A frame is three summary lines, a blank line, the column header and up to
//! `rows + 1` lock statistics rows. [`FrameAssembler`] walks a
//! [`LineSource`](crate::stream::LineSource) through the [`FrameState`]
//! machine and returns a [`FrameOutcome`].

mod assembler;

use std::fmt;

pub use assembler::FrameAssembler;

use crate::validation::{ValidatedRow, ValidationResult};

/// Position of the assembler within a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    AwaitFirst,
    AwaitSecond,
    AwaitThird,
    AwaitBlank,
    AwaitHead,
    ReadingRows { remaining: usize },
    Done,
}

impl FrameState {
    /// True while the frame header is still being matched.
    pub fn in_header(&self) -> bool {
        !matches!(self, FrameState::ReadingRows { .. } | FrameState::Done)
    }
}

impl fmt::Display for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameState::AwaitFirst => write!(f, "AwaitFirst"),
            FrameState::AwaitSecond => write!(f, "AwaitSecond"),
            FrameState::AwaitThird => write!(f, "AwaitThird"),
            FrameState::AwaitBlank => write!(f, "AwaitBlank"),
            FrameState::AwaitHead => write!(f, "AwaitHead"),
            FrameState::ReadingRows { remaining } => write!(f, "ReadingRows({remaining})"),
            FrameState::Done => write!(f, "Done"),
        }
    }
}

/// One captured frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// UUID the title line must carry.
    pub volume_uuid: String,
    /// Largest valid inode on the volume.
    pub max_inode: u64,
    /// Lock acquisitions from the second line, plus one.
    pub total: Option<u64>,
    /// Lock resources from the third line, plus one.
    pub resources: Option<u64>,
    pub rows: Vec<ValidatedRow>,
    pub diagnostics: ValidationResult,
}

impl Frame {
    pub fn new(volume_uuid: impl Into<String>, max_inode: u64) -> Self {
        Frame {
            volume_uuid: volume_uuid.into(),
            max_inode,
            total: None,
            resources: None,
            rows: Vec::new(),
            diagnostics: ValidationResult::default(),
        }
    }

    /// Number of rows that failed validation.
    pub fn invalid_rows(&self) -> usize {
        self.rows.iter().filter(|row| !row.is_valid()).count()
    }

    /// True if neither the frame nor any of its rows recorded an error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_valid() && self.invalid_rows() == 0
    }
}

/// Result of one capture attempt.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Every header line was seen and the rows were read.
    Complete(Frame),
    /// The assembler skipped too many lines waiting for a header line.
    Incomplete { frame: Frame, stalled_in: FrameState },
    /// The input ended. Callers must stop polling.
    StreamClosed,
}

impl FrameOutcome {
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            FrameOutcome::Complete(frame) => Some(frame),
            FrameOutcome::Incomplete { frame, .. } => Some(frame),
            FrameOutcome::StreamClosed => None,
        }
    }

    /// TOTAL of the captured frame, if one was parsed.
    pub fn total(&self) -> Option<u64> {
        self.frame().and_then(|frame| frame.total)
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, FrameOutcome::StreamClosed)
    }
}
