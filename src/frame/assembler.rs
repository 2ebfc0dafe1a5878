use tracing::{debug, error, info, warn};

use super::{Frame, FrameOutcome, FrameState};
use crate::classify::{classify, normalize_header, LineKind, CANONICAL_HEADER};
use crate::stream::{LineSource, StreamLine};
use crate::utils::parse_count;
use crate::validation::{validate_row, ValidationConfig, ValidationError, ValidationWarning};

const FIRST_LINE_FIELDS: usize = 5;
const SECOND_LINE_FIELDS: usize = 10;
const TOTAL_FIELD: usize = 5;
const RESOURCES_FIELD: usize = 3;

/// What a state handler decided about one line.
enum Step {
    Next(FrameState),
    /// Line did not move the frame forward; poll again in the same state.
    Stay,
    Closed,
}

/// Turns a stream of output lines into validated frames.
///
/// The assembler holds only per-run facts (volume UUID, inode bound and
/// configuration); all per-frame state lives inside [`capture`](Self::capture).
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    config: ValidationConfig,
    volume_uuid: String,
    max_inode: u64,
}

impl FrameAssembler {
    pub fn new(config: ValidationConfig, volume_uuid: impl Into<String>, max_inode: u64) -> Self {
        FrameAssembler {
            config,
            volume_uuid: volume_uuid.into(),
            max_inode,
        }
    }

    pub fn volume_uuid(&self) -> &str {
        &self.volume_uuid
    }

    pub fn max_inode(&self) -> u64 {
        self.max_inode
    }

    /// Read lines until one frame has been assembled.
    ///
    /// Capturing may start anywhere in the output: lines before the next title
    /// line are skipped, within the configured budget.
    pub fn capture<S: LineSource>(&self, source: &mut S) -> FrameOutcome {
        let mut frame = Frame::new(self.volume_uuid.clone(), self.max_inode);
        let mut state = FrameState::AwaitFirst;
        let mut skipped = 0;
        let mut skipped_here = 0;

        while state != FrameState::Done {
            let line = match source.next_line() {
                StreamLine::Line(line) => line,
                StreamLine::Closed => {
                    if !state.in_header() {
                        // Header is complete, so the rows we have are a frame.
                        frame.diagnostics.add_warning(ValidationWarning::EndedInRows {
                            got: frame.rows.len(),
                        });
                        return self.finish(frame);
                    }
                    debug!(state = %state, "input closed while assembling a frame");
                    return FrameOutcome::StreamClosed;
                }
            };

            let kind = classify(&line);
            let kind_label = kind.name();
            let step = match state {
                FrameState::AwaitFirst => self.handle_first(&kind, &line, &mut frame),
                FrameState::AwaitSecond => self.handle_second(&kind, &line, &mut frame),
                FrameState::AwaitThird => self.handle_third(&kind, &line, &mut frame, source),
                FrameState::AwaitBlank => match kind {
                    LineKind::Blank => Step::Next(FrameState::AwaitHead),
                    _ => Step::Stay,
                },
                FrameState::AwaitHead => self.handle_head(&kind, &line, &mut frame),
                FrameState::ReadingRows { remaining } => {
                    self.handle_row(kind, line, remaining, &mut frame, source)
                }
                FrameState::Done => Step::Next(FrameState::Done),
            };

            match step {
                Step::Next(next) => {
                    if skipped_here > 0 {
                        frame.diagnostics.add_warning(ValidationWarning::SkippedLines {
                            state: state.to_string(),
                            count: skipped_here,
                        });
                        skipped_here = 0;
                    }
                    state = next;
                }
                Step::Stay => {
                    debug!(state = %state, kind = kind_label, "skipping line");
                    skipped += 1;
                    skipped_here += 1;
                    if skipped > self.config.max_skipped_lines {
                        error!(
                            state = %state,
                            skipped,
                            "gave up waiting for the frame header"
                        );
                        frame.diagnostics.add_error(ValidationError::IncompleteFrame {
                            state: state.to_string(),
                            skipped,
                        });
                        return FrameOutcome::Incomplete {
                            frame,
                            stalled_in: state,
                        };
                    }
                }
                Step::Closed => {
                    debug!(state = %state, "input closed while assembling a frame");
                    return FrameOutcome::StreamClosed;
                }
            }
        }

        self.finish(frame)
    }

    fn record(&self, frame: &mut Frame, err: ValidationError) {
        error!("{err}");
        frame
            .diagnostics
            .add_error_capped(err, self.config.max_errors_per_frame);
    }

    fn handle_first(&self, kind: &LineKind, line: &str, frame: &mut Frame) -> Step {
        if *kind != LineKind::FirstLine {
            return Step::Stay;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != FIRST_LINE_FIELDS {
            self.record(
                frame,
                ValidationError::FieldCount {
                    line: "first".into(),
                    expected: FIRST_LINE_FIELDS,
                    got: tokens.len(),
                },
            );
            return Step::Stay;
        }
        let uuid = tokens[FIRST_LINE_FIELDS - 1];
        if uuid != self.volume_uuid {
            self.record(
                frame,
                ValidationError::VolumeMismatch {
                    expected: self.volume_uuid.clone(),
                    got: uuid.to_string(),
                },
            );
            return Step::Stay;
        }
        Step::Next(FrameState::AwaitSecond)
    }

    fn handle_second(&self, kind: &LineKind, line: &str, frame: &mut Frame) -> Step {
        if *kind != LineKind::SecondLine {
            return Step::Stay;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != SECOND_LINE_FIELDS {
            self.record(
                frame,
                ValidationError::FieldCount {
                    line: "second".into(),
                    expected: SECOND_LINE_FIELDS,
                    got: tokens.len(),
                },
            );
            return Step::Stay;
        }
        // TODO: confirm against o2locktop whether this +1 offsets an
        // off-by-one in its own summary; it is unverified.
        match parse_count(tokens[TOTAL_FIELD]).and_then(|count| count.checked_add(1)) {
            Some(total) => {
                frame.total = Some(total);
                Step::Next(FrameState::AwaitThird)
            }
            None => {
                self.record(
                    frame,
                    ValidationError::UnparsableCount {
                        line: "second".into(),
                        token: tokens[TOTAL_FIELD].to_string(),
                    },
                );
                Step::Stay
            }
        }
    }

    fn handle_third<S: LineSource>(
        &self,
        kind: &LineKind,
        line: &str,
        frame: &mut Frame,
        source: &mut S,
    ) -> Step {
        if *kind != LineKind::ThirdLine {
            return Step::Stay;
        }
        let mut tokens = split_fields(line);
        if tokens.len() <= RESOURCES_FIELD {
            // The resource count sometimes wraps onto the next line.
            let extra = match source.next_line() {
                StreamLine::Line(extra) => extra,
                StreamLine::Closed => return Step::Closed,
            };
            let retry = split_fields(&extra);
            if retry.len() <= RESOURCES_FIELD {
                self.record(
                    frame,
                    ValidationError::TooFewFields {
                        line: "third".into(),
                        min: RESOURCES_FIELD + 1,
                        got: retry.len(),
                    },
                );
                // Not ours; let the next state look at it.
                source.unread(extra);
                return Step::Next(FrameState::AwaitBlank);
            }
            tokens = retry;
        }

        match parse_count(&tokens[RESOURCES_FIELD]).and_then(|count| count.checked_add(1)) {
            Some(resources) => frame.resources = Some(resources),
            None => self.record(
                frame,
                ValidationError::UnparsableCount {
                    line: "third".into(),
                    token: tokens[RESOURCES_FIELD].clone(),
                },
            ),
        }
        Step::Next(FrameState::AwaitBlank)
    }

    fn handle_head(&self, kind: &LineKind, line: &str, frame: &mut Frame) -> Step {
        if *kind != LineKind::HeadLine {
            return Step::Stay;
        }
        let header = normalize_header(line);
        if header != CANONICAL_HEADER {
            self.record(frame, ValidationError::HeaderMismatch { got: header });
        }
        Step::Next(FrameState::ReadingRows {
            remaining: self.config.rows + 1,
        })
    }

    fn handle_row<S: LineSource>(
        &self,
        kind: LineKind,
        line: String,
        remaining: usize,
        frame: &mut Frame,
        source: &mut S,
    ) -> Step {
        match kind {
            LineKind::DataRow(tokens) => {
                frame.rows.push(validate_row(tokens, self.max_inode));
                match remaining.saturating_sub(1) {
                    0 => Step::Next(FrameState::Done),
                    remaining => Step::Next(FrameState::ReadingRows { remaining }),
                }
            }
            _ => {
                // Probably the next frame's title line.
                source.unread(line);
                Step::Next(FrameState::Done)
            }
        }
    }

    fn finish(&self, mut frame: Frame) -> FrameOutcome {
        if frame.rows.len() < self.config.rows {
            info!(
                expected = self.config.rows,
                got = frame.rows.len(),
                "frame has fewer rows than requested"
            );
            frame.diagnostics.add_warning(ValidationWarning::ShortFrame {
                expected: self.config.rows,
                got: frame.rows.len(),
            });
        }
        let invalid = frame.invalid_rows();
        if invalid > 0 {
            warn!(invalid, rows = frame.rows.len(), "frame has invalid rows");
        }
        debug!(
            total = ?frame.total,
            resources = ?frame.resources,
            rows = frame.rows.len(),
            "frame assembled"
        );
        FrameOutcome::Complete(frame)
    }
}

fn split_fields(line: &str) -> Vec<String> {
    line.replace('\n', " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
