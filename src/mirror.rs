//! Local Mirror Materializer
//!
//! Writes remote folder contents into the staging tree so the host editor
//! can work on ordinary files. Only the listed level is materialized:
//! subfolders become empty placeholders and are filled the first time the
//! host asks for them.
//!
//! Materialization is best-effort. A file that cannot be fetched or written
//! is logged and reported, its siblings are still written, and nothing is
//! rolled back.

use futures_util::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::error::MirrorError;
use crate::lister::Lister;
use crate::paths::{join_remote, normalize_remote, Translator};
use crate::providers::{RemoteEntry, RemoteStore};

/// Transfers in flight per `materialize` call
pub const MAX_PARALLEL_TRANSFERS: usize = 10;

/// A single entry that could not be mirrored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializeFailure {
    pub name: String,
    pub message: String,
}

/// Outcome of one `materialize` call
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeReport {
    pub staging_dir: PathBuf,
    /// Files written with remote content
    pub written: Vec<PathBuf>,
    /// Empty directories created for subfolders
    pub placeholders: Vec<PathBuf>,
    pub failures: Vec<MaterializeFailure>,
}

impl MaterializeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum EntryOutcome {
    Written(PathBuf),
    Placeholder(PathBuf),
    Failed(MaterializeFailure),
}

/// Entry names come from the remote store; only plain names map onto the staging tree
fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/') && !name.contains('\\')
}

async fn write_file(path: &Path, content: &[u8]) -> Result<(), MirrorError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::local_io(parent, e))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| MirrorError::local_io(path, e))
}

#[derive(Clone)]
pub struct Materializer {
    store: Arc<dyn RemoteStore>,
    translator: Translator,
}

impl Materializer {
    pub fn new(store: Arc<dyn RemoteStore>, translator: Translator) -> Self {
        Self { store, translator }
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Mirror one listing of `remote_folder` into its staging directory.
    ///
    /// Only a failure to create the staging directory itself is an error.
    pub async fn materialize(
        &self,
        remote_folder: &str,
        entries: &[RemoteEntry],
    ) -> Result<MaterializeReport, MirrorError> {
        let remote_folder = normalize_remote(remote_folder);
        let staging_dir = self.translator.staging_dir(&remote_folder);

        tokio::fs::create_dir_all(&staging_dir)
            .await
            .map_err(|e| MirrorError::local_io(&staging_dir, e))?;

        // Writes are independent per entry; no ordering between them
        let semaphore = Semaphore::new(MAX_PARALLEL_TRANSFERS);
        let outcomes = join_all(entries.iter().map(|entry| async {
            // Never closed, so the permit is always granted
            let _permit = semaphore.acquire().await;
            self.materialize_entry(&remote_folder, &staging_dir, entry).await
        }))
        .await;

        let mut report = MaterializeReport {
            staging_dir,
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                EntryOutcome::Written(path) => report.written.push(path),
                EntryOutcome::Placeholder(path) => report.placeholders.push(path),
                EntryOutcome::Failed(failure) => report.failures.push(failure),
            }
        }

        info!(
            "Materialized {} into {:?}: {} files, {} folders, {} failures",
            remote_folder,
            report.staging_dir,
            report.written.len(),
            report.placeholders.len(),
            report.failures.len()
        );
        Ok(report)
    }

    async fn materialize_entry(
        &self,
        remote_folder: &str,
        staging_dir: &Path,
        entry: &RemoteEntry,
    ) -> EntryOutcome {
        if !is_plain_name(&entry.name) {
            warn!("Skipping entry with unusable name {:?}", entry.name);
            return EntryOutcome::Failed(MaterializeFailure {
                name: entry.name.clone(),
                message: "Entry name cannot be mirrored locally".to_string(),
            });
        }

        let local = staging_dir.join(&entry.name);

        if entry.is_folder() {
            return match tokio::fs::create_dir_all(&local).await {
                Ok(()) => EntryOutcome::Placeholder(local),
                Err(e) => {
                    let err = MirrorError::local_io(&local, e);
                    warn!("Placeholder for {} failed: {}", entry.name, err);
                    EntryOutcome::Failed(MaterializeFailure {
                        name: entry.name.clone(),
                        message: err.to_string(),
                    })
                }
            };
        }

        let remote_path = join_remote(remote_folder, &entry.name);
        let result = match self.store.read_file(&remote_path).await {
            Ok(content) => write_file(&local, &content).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                info!("File written: {:?}", local);
                EntryOutcome::Written(local)
            }
            Err(e) => {
                warn!("Mirroring {} failed: {}", remote_path, e);
                EntryOutcome::Failed(MaterializeFailure {
                    name: entry.name.clone(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// List a nested remote folder and mirror it, the first time the host
    /// opens it in its project tree.
    pub async fn expand_folder(&self, remote_subfolder: &str) -> Result<MaterializeReport, MirrorError> {
        let listing = Lister::new(self.store.clone()).list(remote_subfolder).await?;
        self.materialize(&listing.path, &listing.entries).await
    }

    /// Content for a document the host is opening.
    ///
    /// A non-empty staging copy is returned as-is; an empty or missing one is
    /// fetched from the remote store and written to staging first.
    pub async fn open_on_demand(&self, virtual_path: &str) -> Result<Vec<u8>, MirrorError> {
        let local = self.translator.to_local_path(virtual_path)?;

        match tokio::fs::read(&local).await {
            Ok(content) if !content.is_empty() => return Ok(content),
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(MirrorError::local_io(&local, e)),
        }

        let remote_path = self.translator.remote_path_of(virtual_path)?;
        let content = self.store.read_file(&remote_path).await?;
        write_file(&local, &content).await?;
        info!("Fetched {} on demand into {:?}", remote_path, local);
        Ok(content)
    }

    /// Write bytes to the staging copy of a virtual path
    pub async fn write_local(&self, virtual_path: &str, content: &[u8]) -> Result<PathBuf, MirrorError> {
        let local = self.translator.to_local_path(virtual_path)?;
        write_file(&local, content).await?;
        Ok(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MemoryStore;

    fn setup(store: MemoryStore) -> (tempfile::TempDir, Arc<MemoryStore>, Materializer) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store);
        let translator = Translator::new("remote", dir.path().join("remote-projects"));
        let materializer = Materializer::new(store.clone(), translator);
        (dir, store, materializer)
    }

    async fn list(store: &Arc<MemoryStore>, path: &str) -> Vec<RemoteEntry> {
        store.read_dir(path).await.unwrap()
    }

    #[tokio::test]
    async fn test_materialize_writes_files_and_placeholders() {
        let (_dir, store, materializer) = setup(
            MemoryStore::new("tester")
                .with_file("/docs/a.txt", b"hello")
                .with_file("/docs/sub/deep.txt", b"deep"),
        );

        let entries = list(&store, "/docs").await;
        let report = materializer.materialize("/docs", &entries).await.unwrap();

        let staging = materializer.translator().staging_dir("/docs");
        assert_eq!(report.staging_dir, staging);
        assert!(report.is_complete());
        assert_eq!(std::fs::read(staging.join("a.txt")).unwrap(), b"hello");
        assert!(staging.join("sub").is_dir());
        assert_eq!(std::fs::read_dir(staging.join("sub")).unwrap().count(), 0);
        assert_eq!(store.read_paths(), vec!["/docs/a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_materialize_is_idempotent() {
        let (_dir, store, materializer) = setup(
            MemoryStore::new("tester")
                .with_file("/a.txt", b"first")
                .with_file("/b.txt", b"second")
                .with_folder("/sub"),
        );

        let entries = list(&store, "/").await;
        materializer.materialize("/", &entries).await.unwrap();
        let staging = materializer.translator().staging_dir("/");
        let snapshot = |p: &Path| {
            let mut names: Vec<_> = std::fs::read_dir(p)
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };
        let once = snapshot(&staging);

        materializer.materialize("/", &entries).await.unwrap();
        assert_eq!(snapshot(&staging), once);
        assert_eq!(std::fs::read(staging.join("a.txt")).unwrap(), b"first");
        assert_eq!(std::fs::read(staging.join("b.txt")).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_materialize_overwrites_stale_content() {
        let (_dir, store, materializer) = setup(MemoryStore::new("tester").with_file("/a.txt", b"new"));
        let staging = materializer.translator().staging_dir("/");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("a.txt"), b"old and longer").unwrap();

        let entries = list(&store, "/").await;
        materializer.materialize("/", &entries).await.unwrap();
        assert_eq!(std::fs::read(staging.join("a.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_abort_siblings() {
        let (_dir, store, materializer) = setup(
            MemoryStore::new("tester")
                .with_file("/p/bad.txt", b"x")
                .with_file("/p/good.txt", b"ok"),
        );
        store.fail_reads_of("/p/bad.txt");

        let entries = list(&store, "/p").await;
        let report = materializer.materialize("/p", &entries).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "bad.txt");
        assert_eq!(report.written.len(), 1);
        let staging = materializer.translator().staging_dir("/p");
        assert_eq!(std::fs::read(staging.join("good.txt")).unwrap(), b"ok");
        assert!(!staging.join("bad.txt").exists());
    }

    #[tokio::test]
    async fn test_parallel_transfers_are_bounded() {
        let mut store = MemoryStore::new("tester");
        for i in 0..25 {
            store = store.with_file(&format!("/many/f{:02}.txt", i), b"x");
        }
        let (_dir, store, materializer) = setup(store);

        let entries = list(&store, "/many").await;
        let report = materializer.materialize("/many", &entries).await.unwrap();

        assert_eq!(report.written.len(), 25);
        let peak = store.peak_concurrent_reads();
        assert!(peak > 1, "transfers should overlap, peak was {}", peak);
        assert!(peak <= MAX_PARALLEL_TRANSFERS, "peak was {}", peak);
    }

    #[tokio::test]
    async fn test_unusable_names_are_reported() {
        let (_dir, _store, materializer) = setup(MemoryStore::new("tester"));
        let entries = vec![RemoteEntry::file("..", "/..", 1)];
        let report = materializer.materialize("/", &entries).await.unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.written.is_empty());
    }

    #[tokio::test]
    async fn test_expand_folder_fetches_nested_level_only() {
        let (_dir, _store, materializer) = setup(
            MemoryStore::new("tester")
                .with_file("/docs/sub/page.html", b"<p>")
                .with_file("/docs/sub/deeper/x.css", b"x"),
        );

        let report = materializer.expand_folder("/docs/sub").await.unwrap();
        let staging = materializer.translator().staging_dir("/docs/sub");
        assert_eq!(report.staging_dir, staging);
        assert_eq!(std::fs::read(staging.join("page.html")).unwrap(), b"<p>");
        assert!(staging.join("deeper").is_dir());
        assert!(!staging.join("deeper").join("x.css").exists());
    }

    #[tokio::test]
    async fn test_open_on_demand_fetches_only_when_empty() {
        let (_dir, store, materializer) =
            setup(MemoryStore::new("tester").with_file("/docs/readme.txt", b"remote text"));

        let content = materializer.open_on_demand("remote://docs/readme.txt").await.unwrap();
        assert_eq!(content, b"remote text");
        assert_eq!(store.read_paths().len(), 1);

        // Staged copy now exists and is used without another fetch
        let again = materializer.open_on_demand("remote://docs/readme.txt").await.unwrap();
        assert_eq!(again, b"remote text");
        assert_eq!(store.read_paths().len(), 1);
    }

    #[tokio::test]
    async fn test_write_local_creates_parents() {
        let (_dir, _store, materializer) = setup(MemoryStore::new("tester"));
        let local = materializer
            .write_local("remote://docs/new/notes.md", b"# notes")
            .await
            .unwrap();
        assert!(local.ends_with("docs/new/notes.md"));
        assert_eq!(std::fs::read(local).unwrap(), b"# notes");
        assert!(materializer.write_local("/not/virtual", b"x").await.is_err());
    }
}
