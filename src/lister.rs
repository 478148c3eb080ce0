//! Remote Directory Lister
//!
//! One listing call per navigation. No retry: a failed call ends that
//! navigation and the caller keeps its previous listing.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::MirrorError;
use crate::paths::normalize_remote;
use crate::providers::{RemoteEntry, RemoteStore};

/// Immediate children of one remote folder, in store order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    /// Canonical folder path (`/` for the root)
    pub path: String,
    pub entries: Vec<RemoteEntry>,
}

impl Listing {
    pub fn empty(path: &str) -> Self {
        Self {
            path: normalize_remote(path),
            entries: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Lister {
    store: Arc<dyn RemoteStore>,
}

impl Lister {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self, path: &str) -> Result<Listing, MirrorError> {
        let path = normalize_remote(path);
        match self.store.read_dir(&path).await {
            Ok(entries) => {
                info!("{}: {} entries in {}", self.store.display_name(), entries.len(), path);
                Ok(Listing { path, entries })
            }
            Err(e) => {
                warn!("Listing {} failed: {}", path, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryStore;

    #[tokio::test]
    async fn test_list_normalizes_path() {
        let store = Arc::new(MemoryStore::new("tester").with_file("/docs/a.txt", b"a"));
        let lister = Lister::new(store.clone());

        let listing = lister.list("docs/").await.unwrap();
        assert_eq!(listing.path, "/docs");
        assert_eq!(listing.entries.len(), 1);
        assert!(listing.entries[0].is_file());
        assert_eq!(store.listed_paths(), vec!["/docs".to_string()]);
    }

    #[tokio::test]
    async fn test_list_failure_is_not_retried() {
        let store = Arc::new(MemoryStore::new("tester"));
        let lister = Lister::new(store.clone());

        let err = lister.list("/missing").await.unwrap_err();
        assert!(matches!(err, MirrorError::RemoteAccess(_)));
        assert_eq!(store.listed_paths().len(), 1);
    }
}
