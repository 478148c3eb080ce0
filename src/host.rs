//! Host editor collaborators
//!
//! The editor owns projects, documents and dialogs. The adapter reaches them
//! only through these traits.

use tracing::warn;

/// Opens a project in the host editor
pub trait ProjectHost: Send + Sync {
    fn open_project(&self, project_uri: &str);
}

/// Blocking message to the user (the editor's modal error dialog)
pub trait Notifier: Send + Sync {
    fn show_message(&self, message: &str);
}

/// Notifier that only logs, used by the CLI under `--quiet`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn show_message(&self, message: &str) {
        warn!("{}", message);
    }
}

/// A document as delivered by the host's "document saved" notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDocument {
    /// Host path, e.g. `remote://docs/readme.txt`
    pub path: String,
    pub text: String,
}

impl SavedDocument {
    pub fn new(path: &str, text: &str) -> Self {
        Self {
            path: path.to_string(),
            text: text.to_string(),
        }
    }

    /// File name (last path segment)
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every call for assertions
    #[derive(Default)]
    pub(crate) struct RecordingHost {
        pub(crate) opened: Mutex<Vec<String>>,
        pub(crate) messages: Mutex<Vec<String>>,
    }

    impl RecordingHost {
        pub(crate) fn opened(&self) -> Vec<String> {
            self.opened.lock().unwrap().clone()
        }

        pub(crate) fn messages(&self) -> Vec<String> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl ProjectHost for RecordingHost {
        fn open_project(&self, project_uri: &str) {
            self.opened.lock().unwrap().push(project_uri.to_string());
        }
    }

    impl Notifier for RecordingHost {
        fn show_message(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }
}
