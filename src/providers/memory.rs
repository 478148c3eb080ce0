//! In-memory Remote Store
//!
//! Holds files and folders in maps. Used as the remote double in tests and
//! by the CLI `--demo` mode. Failures and slow listings can be injected
//! per path.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

use super::{RemoteEntry, RemoteStore, UserInfo};
use crate::error::MirrorError;

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    folders: BTreeSet<String>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    reject_auth: bool,
    reject_user_info: bool,
    gates: HashMap<String, Arc<Notify>>,
    listed: Vec<String>,
    read: Vec<String>,
    written: Vec<(String, Vec<u8>)>,
    reads_in_flight: usize,
    peak_reads: usize,
}

/// In-memory Remote Store
pub struct MemoryStore {
    user: UserInfo,
    inner: Mutex<Inner>,
}

/// Canonical form: leading `/`, no trailing `/`, root is `/`
fn canonical(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parent_of(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl MemoryStore {
    pub fn new(user_name: &str) -> Self {
        Self {
            user: UserInfo {
                name: user_name.to_string(),
                email: None,
            },
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Poisoning only happens after a panic elsewhere; the maps stay usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add_ancestors(inner: &mut Inner, path: &str) {
        let mut parent = parent_of(path);
        while parent != "/" {
            inner.folders.insert(parent.clone());
            parent = parent_of(&parent);
        }
    }

    /// Seed a file (parent folders are created implicitly)
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        {
            let mut inner = self.lock();
            let path = canonical(path);
            Self::add_ancestors(&mut inner, &path);
            inner.files.insert(path, content.to_vec());
        }
        self
    }

    /// Seed an empty folder
    pub fn with_folder(self, path: &str) -> Self {
        {
            let mut inner = self.lock();
            let path = canonical(path);
            Self::add_ancestors(&mut inner, &path);
            inner.folders.insert(path);
        }
        self
    }

    /// Make `read_file` fail for this path
    pub fn fail_reads_of(&self, path: &str) {
        self.lock().failing_reads.insert(canonical(path));
    }

    /// Make `write_file` fail for this path
    pub fn fail_writes_to(&self, path: &str) {
        self.lock().failing_writes.insert(canonical(path));
    }

    /// Make `authenticate` fail
    pub fn reject_auth(&self) {
        self.lock().reject_auth = true;
    }

    /// Make `user_info` fail while `authenticate` still succeeds
    pub fn reject_user_info(&self) {
        self.lock().reject_user_info = true;
    }

    /// Hold `read_dir(path)` until `release` is called
    pub fn gate(&self, path: &str) {
        self.lock()
            .gates
            .insert(canonical(path), Arc::new(Notify::new()));
    }

    pub fn release(&self, path: &str) {
        if let Some(gate) = self.lock().gates.remove(&canonical(path)) {
            gate.notify_one();
        }
    }

    /// Current content of a remote file
    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(&canonical(path)).cloned()
    }

    pub fn has_folder(&self, path: &str) -> bool {
        self.lock().folders.contains(&canonical(path))
    }

    /// Paths passed to `read_dir`, in call order
    pub fn listed_paths(&self) -> Vec<String> {
        self.lock().listed.clone()
    }

    /// Paths passed to `read_file`, in call order
    pub fn read_paths(&self) -> Vec<String> {
        self.lock().read.clone()
    }

    /// Highest number of `read_file` calls that were in progress at once
    pub fn peak_concurrent_reads(&self) -> usize {
        self.lock().peak_reads
    }

    /// Successful writes, in call order
    pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().written.clone()
    }

    fn entries_under(&self, dir: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let inner = self.lock();
        if dir != "/" && !inner.folders.contains(dir) {
            return Err(MirrorError::RemoteAccess(format!("path/not_found: {}", dir)));
        }

        let mut entries: Vec<RemoteEntry> = inner
            .folders
            .iter()
            .filter(|p| parent_of(p) == dir)
            .map(|p| RemoteEntry::folder(name_of(p), p))
            .collect();
        entries.extend(
            inner
                .files
                .iter()
                .filter(|(p, _)| parent_of(p) == dir)
                .map(|(p, content)| RemoteEntry::file(name_of(p), p, content.len() as u64)),
        );
        Ok(entries)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    fn display_name(&self) -> String {
        "Memory".to_string()
    }

    async fn authenticate(&self) -> Result<(), MirrorError> {
        if self.lock().reject_auth {
            return Err(MirrorError::Auth("invalid_access_token".to_string()));
        }
        Ok(())
    }

    async fn user_info(&self) -> Result<UserInfo, MirrorError> {
        if self.lock().reject_user_info {
            return Err(MirrorError::RemoteAccess("users/get_current_account failed".to_string()));
        }
        Ok(self.user.clone())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let dir = canonical(path);
        let gate = {
            let mut inner = self.lock();
            inner.listed.push(dir.clone());
            let gate = inner.gates.get(&dir).cloned();
            gate
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.entries_under(&dir)
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, MirrorError> {
        let path = canonical(path);
        let result = {
            let mut inner = self.lock();
            inner.read.push(path.clone());
            inner.reads_in_flight += 1;
            inner.peak_reads = inner.peak_reads.max(inner.reads_in_flight);
            if inner.failing_reads.contains(&path) {
                Err(MirrorError::RemoteAccess(format!("read failed: {}", path)))
            } else {
                inner
                    .files
                    .get(&path)
                    .cloned()
                    .ok_or_else(|| MirrorError::RemoteAccess(format!("path/not_found: {}", path)))
            }
        };

        // Like a network round trip, let other transfers start meanwhile
        tokio::task::yield_now().await;
        self.lock().reads_in_flight -= 1;
        result
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), MirrorError> {
        let path = canonical(path);
        let mut inner = self.lock();
        if inner.failing_writes.contains(&path) {
            return Err(MirrorError::RemoteAccess(format!("write failed: {}", path)));
        }
        if inner.folders.contains(&path) {
            return Err(MirrorError::RemoteAccess(format!("path/conflict/folder: {}", path)));
        }
        Self::add_ancestors(&mut inner, &path);
        inner.files.insert(path.clone(), content.to_vec());
        inner.written.push((path, content.to_vec()));
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), MirrorError> {
        let path = canonical(path);
        if path == "/" {
            return Err(MirrorError::InvalidPath("Cannot delete the root folder".to_string()));
        }
        let mut inner = self.lock();
        let prefix = format!("{}/", path);
        let was_file = inner.files.remove(&path).is_some();
        let was_folder = inner.folders.remove(&path);
        if !was_file && !was_folder {
            return Err(MirrorError::RemoteAccess(format!("path_lookup/not_found: {}", path)));
        }
        inner.files.retain(|p, _| !p.starts_with(&prefix));
        inner.folders.retain(|p| !p.starts_with(&prefix));
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), MirrorError> {
        let path = canonical(path);
        let mut inner = self.lock();
        if inner.files.contains_key(&path) || inner.folders.contains(&path) {
            return Err(MirrorError::RemoteAccess(format!("path/conflict: {}", path)));
        }
        Self::add_ancestors(&mut inner, &path);
        inner.folders.insert(path);
        Ok(())
    }
}
