//! Line-level patching of flat `key=value` config files.
//!
//! The daemons involved (hostapd, dnsmasq, NetworkManager) only need one
//! interface-bound line changed, so files are treated as text: the first line
//! matching a pattern is replaced, or the replacement is appended when no line
//! matches. Applying the same patch twice leaves the bytes unchanged.

use anyhow::Result;
use regex::{NoExpand, Regex};
use std::path::Path;
use tracing::{debug, info};

use crate::files::ConfigFiles;

/// Pattern matching a whole `key=...` line anywhere in a file.
pub fn key_line(key: &str) -> Regex {
    Regex::new(&format!(r"(?m)^{}=.*$", regex::escape(key))).expect("escaped key is a valid pattern")
}

/// Replace the first line matching `pattern` with `replacement`, or append it.
pub fn replace_or_append(content: &str, pattern: &Regex, replacement: &str) -> String {
    if pattern.is_match(content) {
        return pattern.replace(content, NoExpand(replacement)).into_owned();
    }

    let mut updated = content.to_string();
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(replacement);
    updated.push('\n');
    updated
}

/// Patch one line of the file at `path`. Returns whether the content changed.
///
/// An unchanged file is not written back.
pub fn patch_line(
    files: &dyn ConfigFiles,
    path: &Path,
    pattern: &Regex,
    replacement: &str,
) -> Result<bool> {
    let content = files.read(path)?;
    let updated = replace_or_append(&content, pattern, replacement);

    if updated == content {
        debug!("{} already contains '{}'", path.display(), replacement);
        return Ok(false);
    }

    files.write(path, &updated)?;
    info!("Updated {}: {}", path.display(), replacement);
    Ok(true)
}
