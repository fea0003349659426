//! Checker module for output comparison
//!
//! Outputs are compared after canonicalization: every line is trimmed and
//! blank lines at the very end are dropped. Anything else must match exactly.

/// Canonical form of raw program output.
///
/// Every kept line is newline-terminated; invalid UTF-8 is replaced lossily.
pub fn canonicalize(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut lines: Vec<&str> = text.lines().map(str::trim).collect();

    // Remove trailing empty lines
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    let mut canonical = String::with_capacity(text.len());
    for line in lines {
        canonical.push_str(line);
        canonical.push('\n');
    }
    canonical
}

/// Compare program output with an already canonicalized expected answer
pub fn compare_output(actual: &[u8], canonical_expected: &str) -> bool {
    canonicalize(actual) == canonical_expected
}
