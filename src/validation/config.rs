//! Validation configuration.

/// Lock type tags o2locktop prints in the TYPE column.
pub const KNOWN_LOCK_TYPES: &[&str] = &["M", "W", "O", "N", "S"];

/// Lines a frame may need before the next title line comes around, not
/// counting its data rows.
const HEADER_SLACK_LINES: usize = 16;

/// Configuration for frame assembly and row checks.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Number of data rows o2locktop was asked to print (its `-l` option).
    pub rows: usize,

    /// Maximum number of lines the assembler may skip while waiting for a
    /// header line before it gives up on the frame.
    /// Capturing can start anywhere inside a frame, so this has to cover a whole
    /// frame's worth of rows plus the header.
    pub max_skipped_lines: usize,

    /// Maximum number of validation errors to keep per frame.
    pub max_errors_per_frame: usize,
}

impl ValidationConfig {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            max_skipped_lines: 2 * (rows + 1) + HEADER_SLACK_LINES,
            ..Self::default()
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            rows: 0,
            max_skipped_lines: HEADER_SLACK_LINES,
            max_errors_per_frame: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_cap_scales_with_rows() {
        let small = ValidationConfig::new(1);
        let large = ValidationConfig::new(100);
        assert!(large.max_skipped_lines > small.max_skipped_lines);
        assert!(large.max_skipped_lines > 100);
        assert_eq!(large.max_errors_per_frame, 64);
    }
}
