// Remote Mirror Configuration Module
// Persistent settings: staging location, virtual scheme, request timeout

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::MirrorError;

/// Folder under the temp dir that holds all staging directories
pub const PROJECTS_TEMP_FOLDER: &str = "remote-projects";

/// Environment variable holding the Dropbox access token
pub const ACCESS_TOKEN_ENV: &str = "DROPBOX_ACCESS_TOKEN";

/// Mirror configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MirrorConfig {
    /// Root under which one staging directory per remote folder is created
    #[serde(default = "default_staging_root")]
    pub staging_root: PathBuf,
    /// Virtual scheme name, without "://" (projects open as `remote://...`)
    #[serde(default = "default_scheme")]
    pub scheme: String,
    /// HTTP timeout for remote calls, in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Dropbox app key (informational, the token is issued for this app)
    #[serde(default)]
    pub app_key: Option<String>,
}

fn default_staging_root() -> PathBuf {
    std::env::temp_dir().join(PROJECTS_TEMP_FOLDER)
}

fn default_scheme() -> String {
    "remote".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            staging_root: default_staging_root(),
            scheme: default_scheme(),
            request_timeout_secs: default_timeout(),
            app_key: None,
        }
    }
}

/// Get the path to the config file
pub fn get_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("remote-mirror").join("config.json")
}

/// Load configuration from disk, falling back to defaults
pub fn load_config() -> MirrorConfig {
    load_config_from(&get_config_path())
}

pub fn load_config_from(config_path: &std::path::Path) -> MirrorConfig {
    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse mirror config: {}", e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read mirror config: {}", e);
            }
        }
    }

    MirrorConfig::default()
}

/// Save configuration to disk
pub fn save_config(config: &MirrorConfig) -> Result<(), MirrorError> {
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &MirrorConfig, config_path: &std::path::Path) -> Result<(), MirrorError> {
    // Ensure parent directory exists
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| MirrorError::local_io(parent, e))?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| MirrorError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;

    fs::write(config_path, content).map_err(|e| MirrorError::local_io(config_path, e))?;

    tracing::info!("Mirror config saved to {:?}", config_path);
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &MirrorConfig) -> Result<(), MirrorError> {
    if config.scheme.is_empty() {
        return Err(MirrorError::InvalidConfig("Scheme cannot be empty".to_string()));
    }

    if config.scheme.contains(':') || config.scheme.contains('/') {
        return Err(MirrorError::InvalidConfig(
            "Scheme must be a bare name like \"remote\"".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(MirrorError::InvalidConfig("Request timeout must be positive".to_string()));
    }

    if !config.staging_root.is_absolute() {
        return Err(MirrorError::InvalidConfig(
            "Staging root must be an absolute path".to_string(),
        ));
    }

    Ok(())
}
