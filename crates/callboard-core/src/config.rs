//! Configuration resolution for Callboard.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/callboard/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Complete Callboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub database_path: Option<PathBuf>,
    pub log_json: bool,
    /// Upper bound for each blocking phase of a submission (seconds).
    pub request_timeout_secs: u64,
    /// Take the origin address from the first `X-Forwarded-For` entry.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            database_path: None,
            log_json: false,
            request_timeout_secs: 10,
            trust_forwarded_for: false,
        }
    }
}

/// One fixed-window rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_attempts: u32,
    pub window_secs: u64,
}

/// Registration throttling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Accepted submissions per national ID.
    pub identity: WindowLimit,
    /// Accepted submissions per origin address.
    pub origin: WindowLimit,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            identity: WindowLimit {
                max_attempts: 1,
                window_secs: 300,
            },
            origin: WindowLimit {
                max_attempts: 10,
                window_secs: 3600,
            },
        }
    }
}

/// Caller directory behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Attempts at a create-or-increment that keeps hitting write conflicts.
    pub max_retries: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            config = load_config_file(&global_path)?;
        }
    }

    if let Some(path) = explicit {
        config = load_config_file(path)?;
    }

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".callboard").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/callboard/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("callboard").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(val) = var("CALLBOARD_ADDR") {
        config.server.addr = val;
    }
    if let Some(val) = var("CALLBOARD_DB_PATH") {
        config.server.database_path = Some(PathBuf::from(val));
    }
    if let Some(n) = var("CALLBOARD_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        config.server.request_timeout_secs = n;
    }
    if let Some(b) = var("CALLBOARD_TRUST_FORWARDED_FOR").and_then(|v| v.parse().ok()) {
        config.server.trust_forwarded_for = b;
    }
    if let Some(n) = var("CALLBOARD_ORIGIN_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
        config.limits.origin.max_attempts = n;
    }
    if let Some(n) = var("CALLBOARD_MAX_RETRIES").and_then(|v| v.parse().ok()) {
        config.admission.max_retries = n;
    }
}
