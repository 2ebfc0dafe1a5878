//! Common test utilities for o2locktop-verify integration tests.
//!
//! Builders for synthetic o2locktop screens, laid out the way o2locktop
//! refreshes its terminal.

#![allow(dead_code)]

use std::io::Cursor;

use o2locktop_verify::classify::CLEAR_SEQUENCES;
use o2locktop_verify::stream::ReaderSource;

pub const UUID: &str = "7F3A9C5E21B04D6C8E1F2A3B4C5D6E7F";
pub const MAX_INODE: u64 = 26_214_400;
pub const HEADER: &str = "TYPE     INO        EXNUM   EXTIME(us)  EXAVG(us)   PRNUM   PRTIME(us)  PRAVG(us)";

/// One synthetic refresh of the o2locktop screen.
#[derive(Debug, Clone)]
pub struct SyntheticFrame {
    pub uuid: String,
    pub acquisitions: String,
    pub resources: String,
    pub rows: Vec<String>,
    pub clear_screen: bool,
}

impl SyntheticFrame {
    pub fn new(acquisitions: u64) -> Self {
        SyntheticFrame {
            uuid: UUID.to_string(),
            acquisitions: acquisitions.to_string(),
            resources: "1,024".to_string(),
            rows: Vec::new(),
            clear_screen: true,
        }
    }

    /// Add `count` well-formed rows with inodes counting up from 100.
    pub fn with_rows(mut self, count: usize) -> Self {
        for i in 0..count {
            self.rows.push(row("M", 100 + i as i64, [12, 3456, 288, 4, 80, 20]));
        }
        self
    }

    pub fn with_row(mut self, row: String) -> Self {
        self.rows.push(row);
        self
    }

    pub fn lines(&self) -> Vec<String> {
        let clear = if self.clear_screen { CLEAR_SEQUENCES[0] } else { "" };
        let mut lines = vec![
            format!("{clear}o2locktop - ocfs2 volume {}", self.uuid),
            format!(
                "lock acquisitions in last 5s: {} EX: 10 PR: 20",
                self.acquisitions
            ),
            format!("active lock resources: {}", self.resources),
            String::new(),
            HEADER.to_string(),
        ];
        lines.extend(self.rows.iter().cloned());
        lines
    }
}

/// A lock statistics row.
pub fn row(lock_type: &str, inode: i64, counters: [i64; 6]) -> String {
    let counters: Vec<String> = counters.iter().map(|c| c.to_string()).collect();
    format!("{lock_type:<8} {inode:<10} {}", counters.join("   "))
}

/// Join frames into one screen recording.
pub fn screen(frames: &[SyntheticFrame]) -> String {
    let mut text = String::new();
    for frame in frames {
        for line in frame.lines() {
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

pub fn source(frames: &[SyntheticFrame]) -> ReaderSource<Cursor<String>> {
    ReaderSource::new(Cursor::new(screen(frames)))
}
