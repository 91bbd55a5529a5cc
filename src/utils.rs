//! Small helpers for log output and file system preparation.

use std::io;
use std::path::Path;
use tokio::fs;
use tracing::{debug, instrument};

/// Truncate a string for logging purposes.
///
/// Strings longer than `max` characters are cut on a character boundary and
/// get `"…(+N chars)"` appended, so multi-byte quotes never split a code point.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(preview("short", 100), "short");
/// assert_eq!(preview(&"a".repeat(15), 10), "aaaaaaaaaa…(+5 chars)");
/// ```
pub fn preview(s: &str, max: usize) -> String {
    let total = s.chars().count();
    if total <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{}…(+{} chars)", head, total - max)
    }
}

/// Create the parent directory of `path` if it does not exist yet.
///
/// A bare filename has no parent to create and succeeds immediately.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub async fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).await?;
            debug!(parent = %parent.display(), "Parent directory ready");
            Ok(())
        }
        _ => Ok(()),
    }
}
