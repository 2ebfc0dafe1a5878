/// Thousands separator o2locktop puts in its summary counters.
pub const THOUSANDS_SEPARATOR: char = ',';

/// Parse a summary counter such as `1,234` into a plain integer.
///
/// # Examples
///
/// ```
/// use o2locktop_verify::utils::parse_count;
///
/// assert_eq!(parse_count("1,234"), Some(1234));
/// assert_eq!(parse_count("12"), Some(12));
/// assert_eq!(parse_count("n/a"), None);
/// ```
pub fn parse_count(token: &str) -> Option<u64> {
    let digits: String = token
        .chars()
        .filter(|c| *c != THOUSANDS_SEPARATOR)
        .collect();
    digits.parse().ok()
}

/// Strip a single trailing `/` from a mount point, as `df` reports it without one.
pub fn trim_mount_point(mount_point: &str) -> &str {
    if mount_point.len() > 1 {
        mount_point.strip_suffix('/').unwrap_or(mount_point)
    } else {
        mount_point
    }
}
