//! Naming rules shared by the scanner, applier and report builder
//!
//! Remote folders use backslash-separated paths rooted at `Subject`, while
//! repository paths are slash-separated. The helpers here translate between
//! the two and derive the short forms that appear in change records.

/// Root of every remote folder path
pub const SUBJECT_ROOT: &str = "Subject";

/// Remote folder used for units that sit directly under the repository root
pub const DEFAULT_UNIT_FOLDER: &str = "Gitlab";

/// File-name suffix that marks a directory as a script unit
pub const UNIT_MARKER_SUFFIX: &str = ".usr";

/// Upper bound on failure messages stored in change records
pub const MESSAGE_LIMIT: usize = 200;

/// Placeholder for a missing version stamp in change records
const BLANK_STAMP: &str = "-";

/// Normalizes a folder path into the remote `Subject\...` form
///
/// - blank input yields `Subject`
/// - `/` becomes `\` and runs of `\` collapse to one
/// - leading and trailing `\` are trimmed
/// - `Subject\` is prefixed unless already present (case-insensitive)
pub fn normalize_with_subject(path: &str) -> String {
    if path.trim().is_empty() {
        return SUBJECT_ROOT.to_string();
    }

    let mut collapsed = String::with_capacity(path.len() + SUBJECT_ROOT.len() + 1);
    let mut previous_was_separator = false;
    for ch in path.chars() {
        let ch = if ch == '/' { '\\' } else { ch };
        if ch == '\\' {
            if previous_was_separator {
                continue;
            }
            previous_was_separator = true;
        } else {
            previous_was_separator = false;
        }
        collapsed.push(ch);
    }

    let trimmed = collapsed.trim_matches('\\');

    if trimmed.to_lowercase().starts_with("subject\\") {
        trimmed.to_string()
    } else {
        format!("{}\\{}", SUBJECT_ROOT, trimmed)
    }
}

/// Folder and display name derived from a unit's repository path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitLocation {
    /// Repository folder containing the unit (or [`DEFAULT_UNIT_FOLDER`])
    pub folder: String,
    /// Last path segment, used as the display name
    pub name: String,
}

impl UnitLocation {
    /// Splits a repository path at its last `/`
    ///
    /// Backslashes are treated as separators. When there is no separator
    /// after the first character, the folder is [`DEFAULT_UNIT_FOLDER`].
    pub fn from_repo_path(path: &str) -> Self {
        let normalized = path.replace('\\', "/");
        match normalized.rfind('/') {
            Some(idx) if idx > 0 => Self {
                folder: normalized[..idx].to_string(),
                name: normalized[idx + 1..].to_string(),
            },
            Some(idx) => Self {
                folder: DEFAULT_UNIT_FOLDER.to_string(),
                name: normalized[idx + 1..].to_string(),
            },
            None => Self {
                folder: DEFAULT_UNIT_FOLDER.to_string(),
                name: normalized,
            },
        }
    }

    /// Destination folder in the remote system
    pub fn remote_folder_path(&self) -> String {
        normalize_with_subject(&self.folder)
    }
}

/// Returns the unit directory for a marker blob path, if it has one
///
/// A marker at the repository root has no parent directory and yields `None`.
pub fn unit_dir_of_marker(marker_path: &str) -> Option<&str> {
    match marker_path.rfind('/') {
        Some(idx) if idx > 0 => Some(&marker_path[..idx]),
        _ => None,
    }
}

/// First 8 characters of a version stamp, or `-` when blank
pub fn short_stamp(stamp: &str) -> String {
    let stamp = stamp.trim();
    if stamp.is_empty() {
        return BLANK_STAMP.to_string();
    }
    stamp.chars().take(8).collect()
}

/// Truncates a failure message to [`MESSAGE_LIMIT`] characters
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MESSAGE_LIMIT {
        return message.to_string();
    }
    message.chars().take(MESSAGE_LIMIT).collect()
}

/// Replaces characters outside `[A-Za-z0-9._-]` with `_` and lowercases
pub fn safe_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// File name of the packaged archive for a unit at a given stamp
///
/// `<safe last segment without .usr>-<stamp8 lowercase>.zip`
pub fn archive_file_name(unit_path: &str, stamp: &str) -> String {
    let last = unit_path.rsplit('/').next().unwrap_or(unit_path);
    let safe = safe_segment(last).replace(UNIT_MARKER_SUFFIX, "");
    let stamp: String = stamp.trim().chars().take(8).collect();
    format!("{}-{}.zip", safe, stamp.to_lowercase())
}
