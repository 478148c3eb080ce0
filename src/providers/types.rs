//! Shared types for remote stores
//!
//! Entry snapshots returned by directory listings and the account info
//! shown in the browser header.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a remote entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => write!(f, "file"),
            EntryKind::Folder => write!(f, "folder"),
        }
    }
}

/// Remote file/folder entry
///
/// Immutable snapshot produced by one listing call. Never cached across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Entry name (last path segment)
    pub name: String,
    /// Full path from the account root, `/`-prefixed
    pub path: String,
    pub kind: EntryKind,
    /// Size in bytes (0 for folders)
    pub size: u64,
    /// Last server-side modification time
    pub modified_at: Option<DateTime<Utc>>,
}

impl RemoteEntry {
    /// Create a new folder entry
    pub fn folder(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            kind: EntryKind::Folder,
            size: 0,
            modified_at: None,
        }
    }

    /// Create a new file entry
    pub fn file(name: &str, path: &str, size: u64) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            kind: EntryKind::File,
            size,
            modified_at: None,
        }
    }

    pub fn with_modified(mut self, modified_at: DateTime<Utc>) -> Self {
        self.modified_at = Some(modified_at);
        self
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }

    /// Human-readable size, e.g. "1.5 KB"
    pub fn human_size(&self) -> String {
        human_size(self.size)
    }
}

/// Format a byte count the way the browser shows it
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes == 1 {
        return "1 byte".to_string();
    }
    if bytes < 1024 {
        return format!("{} bytes", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    // Pick the unit after rounding, so 1023.99 KB shows as 1 MB
    loop {
        let rounded = (value * 10.0).round() / 10.0;
        if rounded >= 1024.0 && unit < UNITS.len() - 1 {
            value /= 1024.0;
            unit += 1;
        } else {
            value = rounded;
            break;
        }
    }

    // "2 MB" rather than "2.0 MB"
    if value.fract() == 0.0 {
        format!("{:.0} {}", value, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

/// Authenticated account details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Display name shown in the browser header
    pub name: String,
    pub email: Option<String>,
}
