//! Folder Browser Controller
//!
//! Drives one browser session: `Closed → Browsing(path) → Opened | Closed`.
//!
//! Each navigation clears the rows right away and is tagged with a sequence
//! number. A listing that completes after a newer navigation started is
//! dropped, so a slow response can never overwrite a faster later one.
//! The session lock is never held across an await.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::error::MirrorError;
use crate::host::{Notifier, ProjectHost};
use crate::lister::{Lister, Listing};
use crate::mirror::{MaterializeReport, Materializer};
use crate::paths::{breadcrumbs, join_remote, normalize_remote};
use crate::providers::RemoteStore;
use crate::view::{browse_view, header_label, BrowseView};

/// Folder currently shown and its rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseState {
    pub current_path: String,
    pub listing: Listing,
    /// A listing for `current_path` is outstanding
    pub loading: bool,
}

impl BrowseState {
    fn root() -> Self {
        Self {
            current_path: "/".to_string(),
            listing: Listing::empty("/"),
            loading: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserPhase {
    Closed,
    Browsing,
    /// Terminal: the project was handed to the host
    Opened { project_uri: String },
}

/// What happened to a navigation's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    Applied,
    /// A newer navigation (or close) happened first; result dropped
    Superseded,
}

struct Session {
    phase: BrowserPhase,
    state: BrowseState,
    /// Last listing actually shown, restored when a navigation fails
    applied: BrowseState,
    header: Option<String>,
    /// Sequence number of the newest navigation
    latest_seq: u64,
}

pub struct BrowseController {
    store: Arc<dyn RemoteStore>,
    lister: Lister,
    materializer: Materializer,
    project_host: Arc<dyn ProjectHost>,
    notifier: Arc<dyn Notifier>,
    session: Mutex<Session>,
}

impl BrowseController {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        materializer: Materializer,
        project_host: Arc<dyn ProjectHost>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            lister: Lister::new(store.clone()),
            store,
            materializer,
            project_host,
            notifier,
            session: Mutex::new(Session {
                phase: BrowserPhase::Closed,
                state: BrowseState::root(),
                applied: BrowseState::root(),
                header: None,
                latest_seq: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn require_browsing(session: &Session) -> Result<(), MirrorError> {
        match &session.phase {
            BrowserPhase::Browsing => Ok(()),
            other => Err(MirrorError::InvalidState(format!(
                "Browser is not browsing ({:?})",
                other
            ))),
        }
    }

    /// Report an error to the user and hand it back
    fn surface(&self, err: MirrorError) -> MirrorError {
        self.notifier.show_message(&err.to_string());
        err
    }

    pub fn phase(&self) -> BrowserPhase {
        self.lock().phase.clone()
    }

    pub fn state(&self) -> BrowseState {
        self.lock().state.clone()
    }

    pub fn view(&self) -> BrowseView {
        let session = self.lock();
        browse_view(&session.state, session.header.as_deref())
    }

    /// Open the browser: authenticate, show the account, list the root
    pub async fn open(&self) -> Result<NavigationOutcome, MirrorError> {
        {
            let session = self.lock();
            if session.phase != BrowserPhase::Closed {
                return Err(MirrorError::InvalidState("Browser is already open".to_string()));
            }
        }

        self.store.authenticate().await.map_err(|e| self.surface(e))?;

        // A missing account name is reported but does not stop browsing
        let header = match self.store.user_info().await {
            Ok(user) => Some(header_label(&self.store.display_name(), &user)),
            Err(e) => {
                self.notifier.show_message(&e.to_string());
                None
            }
        };

        {
            let mut session = self.lock();
            session.phase = BrowserPhase::Browsing;
            session.header = header;
            session.state = BrowseState::root();
            session.applied = BrowseState::root();
        }
        info!("Browser opened on {}", self.store.display_name());

        self.navigate("/").await
    }

    /// Show the contents of a remote folder
    pub async fn navigate(&self, path: &str) -> Result<NavigationOutcome, MirrorError> {
        let path = normalize_remote(path);
        let seq = {
            let mut session = self.lock();
            Self::require_browsing(&session)?;
            session.latest_seq += 1;
            session.state = BrowseState {
                current_path: path.clone(),
                listing: Listing::empty(&path),
                loading: true,
            };
            session.latest_seq
        };
        debug!("Navigation #{} to {}", seq, path);

        let result = self.lister.list(&path).await;

        let mut session = self.lock();
        if session.latest_seq != seq || session.phase != BrowserPhase::Browsing {
            warn!(
                "Dropping listing #{} of {} (latest is #{})",
                seq, path, session.latest_seq
            );
            return Ok(NavigationOutcome::Superseded);
        }

        match result {
            Ok(listing) => {
                let state = BrowseState {
                    current_path: listing.path.clone(),
                    listing,
                    loading: false,
                };
                session.applied = state.clone();
                session.state = state;
                Ok(NavigationOutcome::Applied)
            }
            Err(e) => {
                session.state = session.applied.clone();
                drop(session);
                Err(self.surface(e))
            }
        }
    }

    /// Click on a folder row
    pub async fn enter_folder(&self, row: usize) -> Result<NavigationOutcome, MirrorError> {
        let target = {
            let session = self.lock();
            Self::require_browsing(&session)?;
            let entry = session
                .state
                .listing
                .entries
                .get(row)
                .ok_or_else(|| MirrorError::InvalidState(format!("No row {}", row)))?;
            if !entry.is_folder() {
                return Err(MirrorError::InvalidPath(format!("{} is not a folder", entry.path)));
            }
            entry.path.clone()
        };
        self.navigate(&target).await
    }

    /// Click on a breadcrumb link
    pub async fn select_breadcrumb(&self, index: usize) -> Result<NavigationOutcome, MirrorError> {
        let target = {
            let session = self.lock();
            Self::require_browsing(&session)?;
            breadcrumbs(&session.state.current_path)
                .get(index)
                .map(|crumb| crumb.path.clone())
                .ok_or_else(|| MirrorError::InvalidState(format!("No breadcrumb {}", index)))?
        };
        self.navigate(&target).await
    }

    /// Confirm "open": mirror the current listing and hand the project to the host
    pub async fn confirm_open(&self) -> Result<MaterializeReport, MirrorError> {
        let (folder, entries) = {
            let session = self.lock();
            Self::require_browsing(&session)?;
            if session.state.loading {
                return Err(MirrorError::InvalidState("Listing is still loading".to_string()));
            }
            (session.state.current_path.clone(), session.state.listing.entries.clone())
        };

        let report = self
            .materializer
            .materialize(&folder, &entries)
            .await
            .map_err(|e| self.surface(e))?;

        let project_uri = self.materializer.translator().project_uri(&folder);
        {
            let mut session = self.lock();
            Self::require_browsing(&session)?;
            session.phase = BrowserPhase::Opened {
                project_uri: project_uri.clone(),
            };
            // Any listing still in flight is now stale
            session.latest_seq += 1;
        }

        info!("Opening project {}", project_uri);
        self.project_host.open_project(&project_uri);
        Ok(report)
    }

    /// Close without opening anything
    pub fn cancel(&self) {
        let mut session = self.lock();
        session.phase = BrowserPhase::Closed;
        session.state = BrowseState::root();
        session.applied = BrowseState::root();
        session.latest_seq += 1;
        debug!("Browser closed");
    }

    /// Create a folder inside the current one and re-list
    pub async fn create_folder(&self, name: &str) -> Result<NavigationOutcome, MirrorError> {
        let name = name.trim();
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(self.surface(MirrorError::InvalidPath(format!(
                "Invalid folder name: {:?}",
                name
            ))));
        }

        let current = {
            let session = self.lock();
            Self::require_browsing(&session)?;
            session.state.current_path.clone()
        };

        self.store
            .make_dir(&join_remote(&current, name))
            .await
            .map_err(|e| self.surface(e))?;
        self.navigate(&current).await
    }

    /// Delete the folder being shown and go to its parent
    pub async fn delete_current_folder(&self) -> Result<NavigationOutcome, MirrorError> {
        let (current, parent) = {
            let session = self.lock();
            Self::require_browsing(&session)?;
            let crumbs = breadcrumbs(&session.state.current_path);
            if crumbs.len() < 2 {
                return Err(MirrorError::InvalidPath("Cannot delete the root folder".to_string()));
            }
            (
                session.state.current_path.clone(),
                crumbs[crumbs.len() - 2].path.clone(),
            )
        };

        self.store.remove(&current).await.map_err(|e| self.surface(e))?;
        self.navigate(&parent).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::RecordingHost;
    use crate::paths::Translator;
    use crate::providers::MemoryStore;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: Arc<MemoryStore>,
        host: Arc<RecordingHost>,
        browser: Arc<BrowseController>,
        translator: Translator,
    }

    fn fixture(store: MemoryStore) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store);
        let host = Arc::new(RecordingHost::default());
        let translator = Translator::new("remote", dir.path().join("remote-projects"));
        let materializer = Materializer::new(store.clone(), translator.clone());
        let browser = Arc::new(BrowseController::new(
            store.clone(),
            materializer,
            host.clone(),
            host.clone(),
        ));
        Fixture {
            _dir: dir,
            store,
            host,
            browser,
            translator,
        }
    }

    #[tokio::test]
    async fn test_open_lists_root_with_header() {
        let f = fixture(MemoryStore::new("Ada").with_file("/a.txt", b"hello"));

        assert_eq!(f.browser.phase(), BrowserPhase::Closed);
        assert_eq!(f.browser.open().await.unwrap(), NavigationOutcome::Applied);
        assert_eq!(f.browser.phase(), BrowserPhase::Browsing);

        let view = f.browser.view();
        assert_eq!(view.header.as_deref(), Some("Memory user: Ada"));
        assert_eq!(view.breadcrumbs.len(), 1);
        assert_eq!(view.rows.len(), 1);
        assert!(!view.loading);
    }

    #[tokio::test]
    async fn test_auth_failure_keeps_browser_closed() {
        let f = fixture(MemoryStore::new("Ada"));
        f.store.reject_auth();

        let err = f.browser.open().await.unwrap_err();
        assert!(matches!(err, MirrorError::Auth(_)));
        assert_eq!(f.browser.phase(), BrowserPhase::Closed);
        assert_eq!(f.host.messages().len(), 1);
        assert!(f.host.messages()[0].starts_with("Authentication error"));
        assert!(f.store.listed_paths().is_empty());
    }

    #[tokio::test]
    async fn test_user_info_failure_still_browses() {
        let f = fixture(MemoryStore::new("Ada").with_file("/a.txt", b"hello"));
        f.store.reject_user_info();

        assert_eq!(f.browser.open().await.unwrap(), NavigationOutcome::Applied);
        assert_eq!(f.browser.phase(), BrowserPhase::Browsing);
        assert_eq!(f.host.messages().len(), 1);

        let view = f.browser.view();
        assert_eq!(view.header, None);
        assert_eq!(view.rows.len(), 1);
    }

    #[tokio::test]
    async fn test_open_project_mirrors_top_level_only() {
        let f = fixture(
            MemoryStore::new("Ada")
                .with_file("/a.txt", b"hello")
                .with_file("/sub/child.txt", b"not yet"),
        );

        f.browser.open().await.unwrap();
        let names: Vec<String> = f.browser.view().rows.iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, vec!["sub".to_string(), "a.txt".to_string()]);

        let report = f.browser.confirm_open().await.unwrap();
        let staging = f.translator.staging_dir("/");
        assert_eq!(report.staging_dir, staging);
        assert_eq!(std::fs::read_to_string(staging.join("a.txt")).unwrap(), "hello");
        assert!(staging.join("sub").is_dir());
        assert_eq!(std::fs::read_dir(staging.join("sub")).unwrap().count(), 0);

        assert_eq!(f.store.read_paths(), vec!["/a.txt".to_string()]);
        assert_eq!(f.store.listed_paths(), vec!["/".to_string()]);
        assert_eq!(f.host.opened(), vec!["remote://".to_string()]);
        assert_eq!(
            f.browser.phase(),
            BrowserPhase::Opened {
                project_uri: "remote://".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_row_and_breadcrumb_navigation() {
        let f = fixture(
            MemoryStore::new("Ada")
                .with_file("/docs/site/index.html", b"<html>")
                .with_file("/docs/readme.txt", b"r"),
        );
        f.browser.open().await.unwrap();

        f.browser.enter_folder(0).await.unwrap();
        assert_eq!(f.browser.state().current_path, "/docs");
        f.browser.enter_folder(0).await.unwrap();
        assert_eq!(f.browser.state().current_path, "/docs/site");

        let crumbs = f.browser.view().breadcrumbs;
        assert_eq!(crumbs.len(), 3);
        assert_eq!(crumbs[1].path, "/docs/");

        f.browser.select_breadcrumb(1).await.unwrap();
        assert_eq!(f.browser.state().current_path, "/docs");

        // readme.txt is a file row
        let err = f.browser.enter_folder(1).await.unwrap_err();
        assert!(matches!(err, MirrorError::InvalidPath(_)));

        f.browser.confirm_open().await.unwrap();
        assert_eq!(f.host.opened(), vec!["remote://docs".to_string()]);
        let staging = f.translator.staging_dir("/docs");
        assert_eq!(std::fs::read(staging.join("readme.txt")).unwrap(), b"r");
    }

    #[tokio::test]
    async fn test_failed_navigation_restores_previous_listing() {
        let f = fixture(MemoryStore::new("Ada").with_file("/a.txt", b"hello"));
        f.browser.open().await.unwrap();
        let before = f.browser.state();

        let err = f.browser.navigate("/missing").await.unwrap_err();
        assert!(matches!(err, MirrorError::RemoteAccess(_)));
        assert_eq!(f.browser.state(), before);
        assert_eq!(f.host.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_stale_listing_is_discarded() {
        let f = fixture(
            MemoryStore::new("Ada")
                .with_file("/slow/a.txt", b"a")
                .with_file("/fast/b.txt", b"b"),
        );
        f.browser.open().await.unwrap();

        f.store.gate("/slow");
        let browser = f.browser.clone();
        let slow = tokio::spawn(async move { browser.navigate("/slow").await });

        // Let the slow request reach the store
        while !f.store.listed_paths().contains(&"/slow".to_string()) {
            tokio::task::yield_now().await;
        }
        assert!(f.browser.view().loading);

        assert_eq!(f.browser.navigate("/fast").await.unwrap(), NavigationOutcome::Applied);
        f.store.release("/slow");
        assert_eq!(slow.await.unwrap().unwrap(), NavigationOutcome::Superseded);

        let state = f.browser.state();
        assert_eq!(state.current_path, "/fast");
        assert_eq!(state.listing.entries[0].name, "b.txt");
    }

    #[tokio::test]
    async fn test_cancel_discards_pending_listing() {
        let f = fixture(MemoryStore::new("Ada").with_folder("/slow"));
        f.browser.open().await.unwrap();

        f.store.gate("/slow");
        let browser = f.browser.clone();
        let pending = tokio::spawn(async move { browser.navigate("/slow").await });
        while !f.store.listed_paths().contains(&"/slow".to_string()) {
            tokio::task::yield_now().await;
        }

        f.browser.cancel();
        f.store.release("/slow");
        assert_eq!(pending.await.unwrap().unwrap(), NavigationOutcome::Superseded);
        assert_eq!(f.browser.phase(), BrowserPhase::Closed);
        assert!(matches!(
            f.browser.navigate("/").await,
            Err(MirrorError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_create_and_delete_folder() {
        let f = fixture(MemoryStore::new("Ada").with_folder("/docs"));
        f.browser.open().await.unwrap();
        f.browser.navigate("/docs").await.unwrap();

        f.browser.create_folder("Untitled").await.unwrap();
        assert!(f.store.has_folder("/docs/Untitled"));
        assert_eq!(f.browser.view().rows[0].name, "Untitled");

        f.browser.enter_folder(0).await.unwrap();
        assert_eq!(f.browser.state().current_path, "/docs/Untitled");

        f.browser.delete_current_folder().await.unwrap();
        assert!(!f.store.has_folder("/docs/Untitled"));
        assert_eq!(f.browser.state().current_path, "/docs");
        assert!(f.browser.view().rows.is_empty());
    }

    #[tokio::test]
    async fn test_root_cannot_be_deleted_and_names_are_checked() {
        let f = fixture(MemoryStore::new("Ada"));
        f.browser.open().await.unwrap();

        assert!(matches!(
            f.browser.delete_current_folder().await,
            Err(MirrorError::InvalidPath(_))
        ));
        assert!(matches!(
            f.browser.create_folder("a/b").await,
            Err(MirrorError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_requires_browsing() {
        let f = fixture(MemoryStore::new("Ada"));
        assert!(matches!(
            f.browser.confirm_open().await,
            Err(MirrorError::InvalidState(_))
        ));
    }
}
