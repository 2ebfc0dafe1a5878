//! Line classification for o2locktop snapshot output.
//!
//! Every line read from the monitored tool is reduced to a [`LineKind`] before
//! the frame assembler looks at it. Classification is a pure function of the
//! line text; the assembler decides what a kind means in its current state.

use std::sync::LazyLock;

use regex::Regex;

/// Screen clear sequences o2locktop emits before each refresh, in both orders
/// the terminal layer has been observed to produce.
pub const CLEAR_SEQUENCES: [&str; 2] = ["\x1b[H\x1b[2J\x1b[3J", "\x1b[3J\x1b[H\x1b[2J"];

/// The column header with all whitespace removed.
pub const CANONICAL_HEADER: &str = "TYPEINOEXNUMEXTIME(us)EXAVG(us)PRNUMPRTIME(us)PRAVG(us)";

/// Number of whitespace separated tokens in a lock statistics row.
pub const ROW_TOKENS: usize = 8;

const FIRST_MARKER: &str = "o2locktop";
const SECOND_MARKER: &str = "acquisitions";
const THIRD_MARKER: &str = "resources";
const HEAD_MARKER: &str = "TIME(us)";

static SIGNED_INT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?[0-9]+$").expect("Invalid signed integer regex pattern"));

/// The eight raw tokens of a lock statistics row.
///
/// Token 0 is the lock type tag, token 1 the inode number and tokens 2..8 the
/// six counters in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowTokens([String; ROW_TOKENS]);

impl RowTokens {
    /// Builds row tokens from a split line, if it has exactly eight tokens.
    pub fn from_tokens(tokens: Vec<String>) -> Option<Self> {
        let tokens: [String; ROW_TOKENS] = tokens.try_into().ok()?;
        Some(Self(tokens))
    }

    pub fn lock_type(&self) -> &str {
        &self.0[0]
    }

    pub fn inode(&self) -> &str {
        &self.0[1]
    }

    pub fn counters(&self) -> &[String] {
        &self.0[2..]
    }
}

/// What a single output line looks like, independent of frame position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Title line carrying the volume UUID.
    FirstLine,
    /// Lock acquisition summary carrying the TOTAL.
    SecondLine,
    /// Lock resource summary.
    ThirdLine,
    /// Column header.
    HeadLine,
    /// Per-inode lock statistics.
    DataRow(RowTokens),
    Blank,
    Unknown,
}

impl LineKind {
    /// Short name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            LineKind::FirstLine => "first",
            LineKind::SecondLine => "second",
            LineKind::ThirdLine => "third",
            LineKind::HeadLine => "head",
            LineKind::DataRow(_) => "row",
            LineKind::Blank => "blank",
            LineKind::Unknown => "unknown",
        }
    }
}

/// Removes the terminal clear sequences from a raw line.
///
/// Repeats until nothing changes so that a removal can never splice together a
/// new sequence, which keeps the operation idempotent.
pub fn strip_clear_sequences(line: &str) -> String {
    let mut out = line.to_string();
    loop {
        let before = out.len();
        for seq in CLEAR_SEQUENCES {
            out = out.replace(seq, "");
        }
        if out.len() == before {
            return out;
        }
    }
}

/// Removes every whitespace character.
pub fn normalize_header(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

fn is_signed_int(token: &str) -> bool {
    SIGNED_INT_RE.is_match(token)
}

fn is_type_tag(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

/// Classifies one line that has already had clear sequences stripped.
pub fn classify(line: &str) -> LineKind {
    if line.contains(FIRST_MARKER) {
        return LineKind::FirstLine;
    }
    if line.contains(SECOND_MARKER) {
        return LineKind::SecondLine;
    }
    if line.contains(THIRD_MARKER) {
        return LineKind::ThirdLine;
    }
    if line.contains(HEAD_MARKER) {
        return LineKind::HeadLine;
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() == ROW_TOKENS
        && is_type_tag(tokens[0])
        && tokens[1..].iter().all(|t| is_signed_int(t))
    {
        let owned = tokens.into_iter().map(str::to_string).collect();
        if let Some(row) = RowTokens::from_tokens(owned) {
            return LineKind::DataRow(row);
        }
    }

    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    LineKind::Unknown
}
