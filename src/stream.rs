//! Line source for the monitored tool's output.
//!
//! All reads from the input go through [`ReaderSource`], which strips the
//! terminal clear sequences, logs each line at trace level and turns end of
//! input (or a read error) into an explicit [`StreamLine::Closed`] value that
//! stays latched for every later poll.

use std::io::{self, BufRead, StdinLock};

use tracing::{debug, error, trace};

use crate::classify::strip_clear_sequences;

/// One poll of a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    Line(String),
    Closed,
}

/// Sequential, single-consumer supply of output lines.
pub trait LineSource {
    /// Returns the next line, or `Closed` once the input has ended.
    fn next_line(&mut self) -> StreamLine;

    /// Hands a line back so that the next poll returns it again.
    ///
    /// Used when a frame ends on a line that belongs to the following frame.
    fn unread(&mut self, line: String);
}

/// [`LineSource`] over any buffered reader.
pub struct ReaderSource<R> {
    reader: R,
    pending: Option<String>,
    closed: bool,
    lines_read: u64,
}

impl ReaderSource<StdinLock<'static>> {
    /// Source reading the process's standard input.
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        ReaderSource {
            reader,
            pending: None,
            closed: false,
            lines_read: 0,
        }
    }

    /// Number of lines consumed from the underlying reader.
    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    pub fn is_closed(&self) -> bool {
        self.closed && self.pending.is_none()
    }
}

impl<R: BufRead> LineSource for ReaderSource<R> {
    fn next_line(&mut self) -> StreamLine {
        if let Some(line) = self.pending.take() {
            return StreamLine::Line(line);
        }
        if self.closed {
            return StreamLine::Closed;
        }

        let mut buf = Vec::new();
        match self.reader.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!(lines = self.lines_read, "got eof on the input stream");
                self.closed = true;
                StreamLine::Closed
            }
            Ok(_) => {
                self.lines_read += 1;
                let raw = String::from_utf8_lossy(&buf);
                let raw = raw.trim_end_matches(['\n', '\r']);
                let line = strip_clear_sequences(raw);
                trace!(line = %line, "read line");
                StreamLine::Line(line)
            }
            Err(e) => {
                error!("failed to read the input stream: {e}");
                self.closed = true;
                StreamLine::Closed
            }
        }
    }

    fn unread(&mut self, line: String) {
        debug_assert!(self.pending.is_none(), "only one line of push back");
        self.pending = Some(line);
    }
}
