//! Progress-line parsing for downloader output
//!
//! The downloader reports progress as lines of the form
//! `[download]  42.5% of 10.00MiB at 1.00MiB/s`. [`parse_percent`] extracts
//! the percentage from such lines and is total: every input yields either
//! exactly one well-formed percentage or `None` — it never errors, so a
//! malformed line can never abort an output stream.

use regex::Regex;
use std::sync::OnceLock;

/// Marker prefix of a download-status line
const DOWNLOAD_MARKER: &str = "[download]";

/// Whitespace-delimited numeric token directly attached to a percent sign
fn percent_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Pattern is a constant; it cannot fail to compile at runtime.
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"(?:^|\s)(\d+(?:\.\d+)?)%").expect("valid percent pattern"))
}

/// Extract the progress percentage from one output line
///
/// A line is recognized when it starts with the `[download]` marker and
/// contains a whitespace-delimited numeric token immediately preceding a
/// percent sign, and that token parses to a value in `[0, 100]`. Anything
/// else — other markers, destination lines, malformed or out-of-range
/// tokens — is not a progress line and yields `None`.
///
/// Parsing is idempotent and side-effect free; callers keep every line
/// (matched or not) in the task's diagnostic log.
pub fn parse_percent(line: &str) -> Option<f32> {
    let line = line.trim();
    if !line.starts_with(DOWNLOAD_MARKER) {
        return None;
    }

    let captures = percent_regex().captures(line)?;
    let percent: f32 = captures.get(1)?.as_str().parse().ok()?;
    if (0.0..=100.0).contains(&percent) {
        Some(percent)
    } else {
        None
    }
}
