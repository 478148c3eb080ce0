//! Path translation between remote folders, virtual project URLs and the
//! local staging tree.
//!
//! A remote folder `/docs` is opened as the project `remote://docs` and
//! mirrored at `<staging_root>/docs`. All three forms are derivable from one
//! another by swapping a fixed prefix, which keeps the staging tree a
//! one-to-one image of the remote tree.

use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

use crate::config::MirrorConfig;
use crate::error::MirrorError;

/// One link in the browser's path bar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    /// Folder path this link navigates to, always `/`-terminated
    pub path: String,
}

/// Build the breadcrumb trail for a remote folder path.
///
/// `"/a/b/"` gives `root → "/"`, `a → "/a/"`, `b → "/a/b/"`. A trailing
/// separator makes no difference and an empty path is the root.
pub fn breadcrumbs(path: &str) -> Vec<Breadcrumb> {
    let mut segments: Vec<&str> = path.split('/').collect();
    if segments.len() > 1 && segments.last() == Some(&"") {
        segments.pop();
    }

    let mut crumbs = Vec::with_capacity(segments.len());
    let mut full_path = String::new();
    for (i, segment) in segments.iter().enumerate() {
        full_path.push_str(segment);
        full_path.push('/');
        crumbs.push(Breadcrumb {
            label: if i == 0 { "root".to_string() } else { segment.to_string() },
            path: full_path.clone(),
        });
    }
    crumbs
}

/// Canonical remote folder path: leading `/`, no trailing `/` except the root
pub fn normalize_remote(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Join a child name onto a remote folder path
pub fn join_remote(folder: &str, name: &str) -> String {
    let folder = normalize_remote(folder);
    let name = name.trim_matches('/');
    if folder == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", folder, name)
    }
}

/// Reject `..`, empty names and NUL bytes in a relative remote path
fn validate_relative(relative: &str) -> Result<(), MirrorError> {
    if relative.contains('\0') {
        return Err(MirrorError::InvalidPath("Path contains null bytes".to_string()));
    }
    for component in Path::new(relative).components() {
        if matches!(component, Component::ParentDir) {
            return Err(MirrorError::InvalidPath(format!(
                "Path traversal ('..') not allowed: {}",
                relative
            )));
        }
    }
    Ok(())
}

/// Prefix-swap translator between remote paths, virtual URLs and staging paths
#[derive(Debug, Clone)]
pub struct Translator {
    scheme_prefix: String,
    staging_root: PathBuf,
}

impl Translator {
    pub fn new(scheme: &str, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            scheme_prefix: format!("{}://", scheme),
            staging_root: staging_root.into(),
        }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(&config.scheme, config.staging_root.clone())
    }

    pub fn scheme_prefix(&self) -> &str {
        &self.scheme_prefix
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Whether a host path belongs to a remote-backed project
    pub fn is_virtual(&self, path: &str) -> bool {
        path.starts_with(&self.scheme_prefix)
    }

    /// `remote://docs/readme.txt` → `/docs/readme.txt`
    pub fn remote_path_of(&self, virtual_path: &str) -> Result<String, MirrorError> {
        let rest = virtual_path.strip_prefix(&self.scheme_prefix).ok_or_else(|| {
            MirrorError::InvalidPath(format!(
                "{} is not under {}",
                virtual_path, self.scheme_prefix
            ))
        })?;
        let remote = normalize_remote(rest);
        validate_relative(remote.trim_start_matches('/'))?;
        Ok(remote)
    }

    /// `/docs/readme.txt` → `remote://docs/readme.txt`
    pub fn virtual_path_of(&self, remote_path: &str) -> String {
        format!("{}{}", self.scheme_prefix, remote_path.trim_matches('/'))
    }

    /// Project URI handed to the host when a remote folder is opened
    pub fn project_uri(&self, remote_folder: &str) -> String {
        self.virtual_path_of(remote_folder)
    }

    /// `remote://docs/readme.txt` → `<staging_root>/docs/readme.txt`
    pub fn to_local_path(&self, virtual_path: &str) -> Result<PathBuf, MirrorError> {
        let remote = self.remote_path_of(virtual_path)?;
        Ok(self.local_path_for_remote(&remote))
    }

    /// Staging path for a canonical remote path
    pub fn local_path_for_remote(&self, remote_path: &str) -> PathBuf {
        let mut local = self.staging_root.clone();
        for segment in remote_path.split('/').filter(|s| !s.is_empty()) {
            local.push(segment);
        }
        local
    }

    /// Staging directory mirroring a remote folder
    pub fn staging_dir(&self, remote_folder: &str) -> PathBuf {
        self.local_path_for_remote(&normalize_remote(remote_folder))
    }

    /// Reverse of `to_local_path`
    pub fn from_local_path(&self, local: &Path) -> Result<String, MirrorError> {
        let relative = local.strip_prefix(&self.staging_root).map_err(|_| {
            MirrorError::InvalidPath(format!(
                "{} is outside the staging root {}",
                local.display(),
                self.staging_root.display()
            ))
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                _ => {
                    return Err(MirrorError::InvalidPath(format!(
                        "Unexpected component in {}",
                        local.display()
                    )))
                }
            }
        }
        Ok(format!("{}{}", self.scheme_prefix, segments.join("/")))
    }

    /// Rewrite a live-preview URL so the preview server can read the staged file.
    ///
    /// `file://remote://docs/index.html` → `file:///<staging_root>/docs/index.html`.
    /// Any other URL is returned unchanged.
    pub fn map_preview_url(&self, url: &str) -> String {
        let Some(virtual_part) = url.strip_prefix("file://") else {
            return url.to_string();
        };
        if !self.is_virtual(virtual_part) {
            return url.to_string();
        }

        // Keep query and fragment as-is
        let split_at = virtual_part.find(['?', '#']).unwrap_or(virtual_part.len());
        let (path_part, suffix) = virtual_part.split_at(split_at);

        // The tail is percent-encoded; decode it so it is not encoded twice
        let decoded = match urlencoding::decode(path_part) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("Cannot decode preview URL {}: {}", url, e);
                return url.to_string();
            }
        };

        let local = match self.to_local_path(&decoded) {
            Ok(local) => local,
            Err(e) => {
                warn!("Cannot map preview URL {}: {}", url, e);
                return url.to_string();
            }
        };

        match url::Url::from_file_path(&local) {
            Ok(file_url) => format!("{}{}", file_url, suffix),
            Err(()) => {
                warn!("Staging path {:?} cannot be expressed as a file URL", local);
                url.to_string()
            }
        }
    }
}
