//! Remote Store Module
//!
//! Every backend the mirror can browse implements the `RemoteStore` trait.
//! The browser controller, the materializer and the save adapter only ever
//! talk to this trait, never to a transport.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              RemoteStore Trait              │
//! │  authenticate, read_dir, read_file, ...     │
//! └─────────────────────────────────────────────┘
//!                      │
//!            ┌─────────┴─────────┐
//!            ▼                   ▼
//!       ┌─────────┐        ┌──────────┐
//!       │ Dropbox │        │  Memory  │
//!       └─────────┘        └──────────┘
//! ```

pub mod dropbox;
pub mod memory;
pub mod types;

pub use dropbox::{DropboxConfig, DropboxStore};
pub use memory::MemoryStore;
pub use types::*;

use async_trait::async_trait;

use crate::error::MirrorError;

/// Remote store capability
///
/// Methods take `&self` so one store can be shared behind an `Arc` by the
/// browser and the save adapter. Paths are `/`-separated and rooted at `/`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Display name for this store
    fn display_name(&self) -> String;

    /// Check credentials against the backend
    async fn authenticate(&self) -> Result<(), MirrorError>;

    /// Account details for the browser header
    async fn user_info(&self) -> Result<UserInfo, MirrorError>;

    /// List the immediate children of a folder
    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, MirrorError>;

    /// Read a whole file into memory
    async fn read_file(&self, path: &str) -> Result<Vec<u8>, MirrorError>;

    /// Write a whole file, overwriting any existing content
    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), MirrorError>;

    /// Delete a file or a folder with its contents
    async fn remove(&self, path: &str) -> Result<(), MirrorError>;

    /// Create a folder
    async fn make_dir(&self, path: &str) -> Result<(), MirrorError>;
}

/// Strip bearer tokens from provider messages and cap their length
/// before they reach an error or the user.
pub fn sanitize_api_error(text: &str) -> String {
    const MAX_LEN: usize = 300;

    let mut out = String::with_capacity(text.len().min(MAX_LEN));
    let mut redact_next = false;
    for (i, word) in text.split(' ').enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if redact_next {
            out.push_str("[REDACTED]");
            redact_next = false;
            continue;
        }
        if word.eq_ignore_ascii_case("bearer") {
            redact_next = true;
        }
        out.push_str(word);
    }

    let trimmed = out.trim();
    if trimmed.chars().count() > MAX_LEN {
        let cut: String = trimmed.chars().take(MAX_LEN).collect();
        format!("{}...", cut)
    } else {
        trimmed.to_string()
    }
}
