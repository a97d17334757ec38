use std::fmt;

use chrono::{DateTime, TimeZone};

/// Longest filename (in bytes) accepted by the filesystems we target.
pub const MAX_FILENAME_LEN: usize = 255;

/// `YYYYMMDD_HHMMSS`, fixed width so stored names sort chronologically.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Width of the `YYYYMMDD_HHMMSS_` prefix put in front of every stored name.
pub const TIMESTAMP_PREFIX_LEN: usize = 16;

const FALLBACK_NAME: &str = "unnamed";

/// Sanitize a user-provided filename into a single path component of at most
/// `max_len` bytes.
///
/// Never fails: hostile or empty input degrades to `unnamed`. The result never
/// contains `/` or `\`, is never `.` or `..`, and is never empty. A `max_len` of
/// zero is treated as one.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let max_len = max_len.max(1);

    // 1. Take only the last path component (strip directories)
    let trimmed = name.trim_end_matches(is_separator);
    let name = trimmed.rsplit(is_separator).next().unwrap_or(trimmed);

    // 2. Replace problematic characters
    let mut name = normalize(name);

    // 3. Ensure filename is not empty
    if is_unusable(&name) {
        name = FALLBACK_NAME.to_string();
    }

    // 4. Enforce the length bound, keeping the extension when it fits
    if name.len() > max_len {
        name = truncate_keeping_extension(&name, max_len);
        if is_unusable(&name) {
            name = truncate_at_char_boundary(FALLBACK_NAME, max_len).to_string();
        }
    }

    name
}

/// Build the on-disk name `<timestamp>_<sanitized>` for an upload, keeping the
/// whole thing within [`MAX_FILENAME_LEN`] bytes.
///
/// Two uploads of the same name within the same second get the same stored
/// name; the later write replaces the earlier one.
pub fn stored_filename(timestamp: &UploadTimestamp, raw_name: &str) -> String {
    let name = sanitize_filename(raw_name, MAX_FILENAME_LEN - TIMESTAMP_PREFIX_LEN);
    format!("{}_{}", timestamp, name)
}

/// Upload time rendered as `YYYYMMDD_HHMMSS`. Captured once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTimestamp(String);

impl UploadTimestamp {
    /// Current local time, matching what an operator sees in `ls -l`.
    pub fn now() -> Self {
        Self::from_datetime(&chrono::Local::now())
    }

    pub fn from_datetime<Tz>(at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        Self(at.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn is_unusable(name: &str) -> bool {
    name.is_empty() || name == "."
}

fn normalize(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| match c {
            ' ' => '_',
            '/' | '\\' => '-',
            other => other,
        })
        .collect();

    // "..." collapses to ".." in one pass, so repeat until none are left.
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    out
}

fn truncate_keeping_extension(name: &str, max_len: usize) -> String {
    let ext = name.rfind('.').map(|idx| &name[idx..]).unwrap_or("");

    if ext.len() >= max_len {
        // No room for a base: the extension is sacrificed.
        return truncate_at_char_boundary(name, max_len).to_string();
    }

    let base = &name[..name.len() - ext.len()];
    let base = truncate_at_char_boundary(base, max_len - ext.len());
    format!("{}{}", base, ext)
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a char.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
