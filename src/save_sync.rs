//! Sync-on-Save Adapter
//!
//! Hooks the host's "document saved" notification. Documents under the
//! virtual scheme are copied into staging and pushed to the remote store in
//! a detached task. The host's save has already succeeded when the push
//! starts and is never undone by it. Last writer wins.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::MirrorError;
use crate::host::{Notifier, SavedDocument};
use crate::mirror::Materializer;
use crate::providers::RemoteStore;

/// Handle on one save that went through the adapter
#[derive(Debug)]
pub struct SaveReport {
    /// Remote path the text is pushed to
    pub remote_path: String,
    /// Refreshed staging copy, if the local write succeeded
    pub staged: Option<PathBuf>,
    /// Detached remote push
    pub push: JoinHandle<Result<(), MirrorError>>,
}

impl SaveReport {
    /// Wait for the remote push (hosts normally don't)
    pub async fn wait(self) -> Result<(), MirrorError> {
        self.push
            .await
            .map_err(|e| MirrorError::InvalidState(format!("Remote push task failed: {}", e)))?
    }
}

pub struct SaveSync {
    store: Arc<dyn RemoteStore>,
    materializer: Materializer,
    notifier: Arc<dyn Notifier>,
}

impl SaveSync {
    pub fn new(store: Arc<dyn RemoteStore>, materializer: Materializer, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            materializer,
            notifier,
        }
    }

    /// Handle a saved document.
    ///
    /// Returns `Ok(None)` for documents outside the virtual scheme. Must be
    /// called inside a tokio runtime.
    pub async fn document_saved(&self, doc: &SavedDocument) -> Result<Option<SaveReport>, MirrorError> {
        let translator = self.materializer.translator();
        if !translator.is_virtual(&doc.path) {
            debug!("Ignoring save of non-remote document {}", doc.path);
            return Ok(None);
        }

        let remote_path = translator.remote_path_of(&doc.path)?;
        if remote_path == "/" || doc.name().is_empty() {
            return Err(MirrorError::InvalidPath(format!(
                "{} names a folder, not a document",
                doc.path
            )));
        }

        let staged = match self.materializer.write_local(&doc.path, doc.text.as_bytes()).await {
            Ok(local) => Some(local),
            Err(e) => {
                warn!("Staging copy of {} not refreshed: {}", doc.path, e);
                None
            }
        };

        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let name = doc.name().to_string();
        let content = doc.text.clone().into_bytes();
        let target = remote_path.clone();

        let push = tokio::spawn(async move {
            match store.write_file(&target, &content).await {
                Ok(()) => {
                    info!("Pushed {} ({} bytes) to {}", target, content.len(), store.display_name());
                    notifier.show_message(&format!("File {} saved", name));
                    Ok(())
                }
                Err(e) => {
                    warn!("Push of {} failed: {}", target, e);
                    notifier.show_message(&format!(
                        "File {} saved locally but not to {}: {}",
                        name,
                        store.display_name(),
                        e
                    ));
                    Err(e)
                }
            }
        });

        Ok(Some(SaveReport {
            remote_path,
            staged,
            push,
        }))
    }
}
