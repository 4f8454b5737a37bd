//! Small formatting and filesystem helpers shared by the context.

use crate::error::Result;
use std::path::PathBuf;

/// Expand a glob pattern into a sorted list of matching paths.
pub(crate) fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = glob::glob(pattern)?.filter_map(|entry| entry.ok()).collect();
    paths.sort();
    Ok(paths)
}

/// "1 row", "3 rows".
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

/// Render a byte count the way humans read memory sizes.
pub fn format_size(bytes: usize) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.2}{}", value, UNITS[unit])
    }
}

/// Parse sizes like "1MB", "256KB", "4096". Returns `None` for anything that
/// does not look like a size.
pub fn parse_size(text: &str) -> Option<usize> {
    let text = text.trim();
    let split = match text.find(|c: char| !c.is_ascii_digit()) {
        Some(0) => return None,
        Some(pos) => pos,
        None => return text.parse().ok(),
    };
    let (digits, suffix) = text.split_at(split);
    let value: usize = digits.parse().ok()?;
    let factor = match suffix.trim().to_ascii_uppercase().as_str() {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    Some(value * factor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "row"), "1 row");
        assert_eq!(pluralize(4, "row"), "4 rows");
        assert_eq!(pluralize(0, "file"), "0 files");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(2048), "2.00KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00MB");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("1MB"), Some(1024 * 1024));
        assert_eq!(parse_size("256KB"), Some(256 * 1024));
        assert_eq!(parse_size("64B"), Some(64));
        assert_eq!(parse_size("4096"), Some(4096));
        assert_eq!(parse_size("MB"), None);
        assert_eq!(parse_size("12XB"), None);
    }
}
