// Remote Mirror - browse a Dropbox folder, mirror it into a local staging
// directory, and push saved documents back

pub mod browser;
pub mod config;
pub mod error;
pub mod host;
pub mod lister;
pub mod mirror;
pub mod paths;
pub mod providers;
pub mod save_sync;
pub mod view;

pub use browser::{BrowseController, BrowseState, BrowserPhase, NavigationOutcome};
pub use config::MirrorConfig;
pub use error::MirrorError;
pub use host::{Notifier, ProjectHost, SavedDocument, TracingNotifier};
pub use lister::{Lister, Listing};
pub use mirror::{MaterializeFailure, MaterializeReport, Materializer};
pub use paths::{breadcrumbs, Breadcrumb, Translator};
pub use providers::{DropboxConfig, DropboxStore, MemoryStore, RemoteEntry, RemoteStore};
pub use save_sync::{SaveReport, SaveSync};
pub use view::{BrowseView, RowView};
