//! Dropbox Remote Store
//!
//! Implements RemoteStore for Dropbox using the Dropbox API v2.
//! The OAuth authorization flow happens outside this crate; the store is
//! handed an access token and only validates it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use super::{sanitize_api_error, EntryKind, RemoteEntry, RemoteStore, UserInfo};
use crate::error::MirrorError;

/// Dropbox API endpoints
const API_BASE: &str = "https://api.dropboxapi.com/2";
const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";

/// Dropbox file metadata
#[derive(Debug, Deserialize)]
struct DropboxMetadata {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    path_lower: Option<String>,
    path_display: Option<String>,
    #[serde(default)]
    size: u64,
    server_modified: Option<String>,
}

/// List folder response
#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<DropboxMetadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct AccountName {
    display_name: String,
}

/// users/get_current_account response (fields we use)
#[derive(Debug, Deserialize)]
struct CurrentAccount {
    name: AccountName,
    email: Option<String>,
}

/// Dropbox store configuration
#[derive(Debug, Clone)]
pub struct DropboxConfig {
    pub access_token: SecretString,
    pub timeout_secs: u64,
}

impl DropboxConfig {
    pub fn new(access_token: &str, timeout_secs: u64) -> Self {
        Self {
            access_token: SecretString::from(access_token.to_string()),
            timeout_secs,
        }
    }
}

/// Dropbox Remote Store
pub struct DropboxStore {
    config: DropboxConfig,
    client: reqwest::Client,
}

impl DropboxStore {
    pub fn new(config: DropboxConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Get authorization header
    fn auth_header(&self) -> Result<HeaderValue, MirrorError> {
        let token = self.config.access_token.expose_secret();
        if token.trim().is_empty() {
            return Err(MirrorError::Auth("No access token configured".to_string()));
        }
        HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| MirrorError::Auth(format!("Invalid token: {}", e)))
    }

    /// Map a failed response to the error taxonomy
    async fn error_from_response(context: &str, response: reqwest::Response) -> MirrorError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            return MirrorError::Auth(format!("Invalid token (HTTP {})", status));
        }
        MirrorError::RemoteAccess(format!(
            "{} failed ({}): {}",
            context,
            status,
            sanitize_api_error(&text)
        ))
    }

    /// Make API call with RPC style
    async fn rpc_call<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, MirrorError> {
        let url = format!("{}/{}", API_BASE, endpoint);

        let mut request = self.client.post(&url).header(AUTHORIZATION, self.auth_header()?);
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| MirrorError::RemoteAccess(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(endpoint, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| MirrorError::RemoteAccess(format!("Parse error: {}", e)))
    }

    /// List folder, following continuation cursors
    async fn list_folder_all(&self, path: &str) -> Result<Vec<DropboxMetadata>, MirrorError> {
        let body = serde_json::json!({
            "path": normalize_path(path),
            "recursive": false,
            "include_deleted": false,
            "include_has_explicit_shared_members": false,
            "include_mounted_folders": true
        });

        let mut result: ListFolderResult = self.rpc_call("files/list_folder", Some(&body)).await?;
        let mut all_entries = result.entries;

        while result.has_more {
            debug!("list_folder {} has more, continuing", path);
            let continue_body = serde_json::json!({
                "cursor": result.cursor
            });
            result = self
                .rpc_call("files/list_folder/continue", Some(&continue_body))
                .await?;
            all_entries.extend(result.entries);
        }

        Ok(all_entries)
    }
}

/// Normalize path for Dropbox API (empty string = root, paths start with /)
fn normalize_path(path: &str) -> String {
    let path = path.trim_matches('/');
    if path.is_empty() {
        String::new()
    } else {
        format!("/{}", path)
    }
}

/// Convert Dropbox metadata to RemoteEntry
fn to_remote_entry(meta: &DropboxMetadata) -> RemoteEntry {
    let kind = if meta.tag == "folder" {
        EntryKind::Folder
    } else {
        EntryKind::File
    };
    let path = meta
        .path_display
        .clone()
        .unwrap_or_else(|| meta.path_lower.clone().unwrap_or_default());
    let modified_at = meta
        .server_modified
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    RemoteEntry {
        name: meta.name.clone(),
        path,
        kind,
        size: if kind == EntryKind::Folder { 0 } else { meta.size },
        modified_at,
    }
}

#[async_trait]
impl RemoteStore for DropboxStore {
    fn display_name(&self) -> String {
        "Dropbox".to_string()
    }

    async fn authenticate(&self) -> Result<(), MirrorError> {
        // Validate by getting account info
        let _: CurrentAccount = self.rpc_call("users/get_current_account", None).await?;
        info!("Authenticated with Dropbox");
        Ok(())
    }

    async fn user_info(&self) -> Result<UserInfo, MirrorError> {
        let account: CurrentAccount = self.rpc_call("users/get_current_account", None).await?;
        Ok(UserInfo {
            name: account.name.display_name,
            email: account.email,
        })
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<RemoteEntry>, MirrorError> {
        let entries = self.list_folder_all(path).await?;
        info!("Listed {} entries in {}", entries.len(), path);
        Ok(entries
            .iter()
            .filter(|e| e.tag != "deleted")
            .map(to_remote_entry)
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, MirrorError> {
        let arg = serde_json::json!({
            "path": normalize_path(path)
        });

        let url = format!("{}/files/download", CONTENT_BASE);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth_header()?)
            .header("Dropbox-API-Arg", arg.to_string())
            .send()
            .await
            .map_err(|e| MirrorError::RemoteAccess(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("Download", response).await);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MirrorError::RemoteAccess(format!("Read error: {}", e)))?;

        info!("Downloaded {} ({} bytes)", path, bytes.len());
        Ok(bytes.to_vec())
    }

    async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), MirrorError> {
        let arg = serde_json::json!({
            "path": normalize_path(path),
            "mode": "overwrite",
            "autorename": false,
            "mute": false
        });

        let url = format!("{}/files/upload", CONTENT_BASE);

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.auth_header()?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("Dropbox-API-Arg", arg.to_string())
            .body(content.to_vec())
            .send()
            .await
            .map_err(|e| MirrorError::RemoteAccess(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("Upload", response).await);
        }

        info!("Uploaded {} ({} bytes)", path, content.len());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), MirrorError> {
        let full_path = normalize_path(path);
        if full_path.is_empty() {
            return Err(MirrorError::InvalidPath("Cannot delete the root folder".to_string()));
        }

        let body = serde_json::json!({
            "path": full_path
        });

        // delete_v2 removes folders with their contents
        let _: serde_json::Value = self.rpc_call("files/delete_v2", Some(&body)).await?;

        info!("Deleted: {}", path);
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), MirrorError> {
        let body = serde_json::json!({
            "path": normalize_path(path),
            "autorename": false
        });

        let _: serde_json::Value = self.rpc_call("files/create_folder_v2", Some(&body)).await?;

        info!("Created folder: {}", path);
        Ok(())
    }
}
