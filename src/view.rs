//! Browser view model
//!
//! Pure transform from browse state to what a dialog draws. Nothing here
//! touches the network or the filesystem.

use serde::Serialize;
use std::fmt;

use crate::browser::BrowseState;
use crate::paths::{breadcrumbs, Breadcrumb};
use crate::providers::{RemoteEntry, UserInfo};

const MODIFIED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One row of the folder table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub name: String,
    /// Remote path the row navigates to (folders) or names (files)
    pub path: String,
    /// Icon name: "file" or "folder"
    pub icon: &'static str,
    pub size_label: String,
    pub modified_label: String,
    /// Folder rows are clickable and highlight on hover
    pub css_class: Option<&'static str>,
}

impl RowView {
    pub fn is_navigable(&self) -> bool {
        self.css_class.is_some()
    }
}

/// Everything the browser dialog shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseView {
    /// "Dropbox user: <name>" once the account is known
    pub header: Option<String>,
    pub breadcrumbs: Vec<Breadcrumb>,
    pub rows: Vec<RowView>,
    /// A listing request is outstanding
    pub loading: bool,
}

pub fn row_view(entry: &RemoteEntry) -> RowView {
    let folder = entry.is_folder();
    RowView {
        name: entry.name.clone(),
        path: entry.path.clone(),
        icon: if folder { "folder" } else { "file" },
        size_label: if folder { String::new() } else { entry.human_size() },
        modified_label: entry
            .modified_at
            .map(|dt| dt.format(MODIFIED_FORMAT).to_string())
            .unwrap_or_default(),
        css_class: folder.then_some("folder-row"),
    }
}

pub fn header_label(store_name: &str, user: &UserInfo) -> String {
    format!("{} user: {}", store_name, user.name)
}

pub fn browse_view(state: &BrowseState, header: Option<&str>) -> BrowseView {
    BrowseView {
        header: header.map(str::to_string),
        breadcrumbs: breadcrumbs(&state.current_path),
        rows: state.listing.entries.iter().map(row_view).collect(),
        loading: state.loading,
    }
}

impl fmt::Display for BrowseView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(header) = &self.header {
            writeln!(f, "{}", header)?;
        }

        let trail: Vec<&str> = self.breadcrumbs.iter().map(|c| c.label.as_str()).collect();
        writeln!(f, "{}", trail.join(" / "))?;

        if self.loading {
            return writeln!(f, "  (loading)");
        }
        if self.rows.is_empty() {
            return writeln!(f, "  (empty)");
        }

        let width = self.rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
        for row in &self.rows {
            let marker = if row.is_navigable() { "d" } else { "-" };
            writeln!(
                f,
                "  {} {:<width$}  {:>10}  {}",
                marker,
                row.name,
                row.size_label,
                row.modified_label,
                width = width
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lister::Listing;
    use chrono::{TimeZone, Utc};

    fn state() -> BrowseState {
        BrowseState {
            current_path: "/docs/".to_string(),
            listing: Listing {
                path: "/docs".to_string(),
                entries: vec![
                    RemoteEntry::folder("sub", "/docs/sub"),
                    RemoteEntry::file("a.txt", "/docs/a.txt", 1536)
                        .with_modified(Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()),
                ],
            },
            loading: false,
        }
    }

    #[test]
    fn test_row_view() {
        let rows: Vec<RowView> = state().listing.entries.iter().map(row_view).collect();

        assert_eq!(rows[0].icon, "folder");
        assert_eq!(rows[0].css_class, Some("folder-row"));
        assert_eq!(rows[0].size_label, "");
        assert!(rows[0].is_navigable());

        assert_eq!(rows[1].icon, "file");
        assert_eq!(rows[1].css_class, None);
        assert_eq!(rows[1].size_label, "1.5 KB");
        assert_eq!(rows[1].modified_label, "2024-03-09 14:05");
    }

    #[test]
    fn test_browse_view_and_text_rendering() {
        let user = UserInfo {
            name: "Ada".to_string(),
            email: None,
        };
        let header = header_label("Dropbox", &user);
        let view = browse_view(&state(), Some(&header));

        assert_eq!(view.header.as_deref(), Some("Dropbox user: Ada"));
        assert_eq!(view.breadcrumbs.len(), 2);
        assert_eq!(view.breadcrumbs[1].path, "/docs/");

        let text = view.to_string();
        assert!(text.starts_with("Dropbox user: Ada\nroot / docs\n"));
        assert!(text.contains("d sub"));
        assert!(text.contains("- a.txt"));
    }

    #[test]
    fn test_loading_view_has_no_rows() {
        let mut s = state();
        s.listing = Listing::empty("/docs");
        s.loading = true;
        let view = browse_view(&s, None);
        assert!(view.rows.is_empty());
        assert!(view.to_string().contains("(loading)"));
    }
}
