//! Configuration persistence with atomic writes and migrations.
//!
//! Stores application configuration in a JSON file with:
//! - Atomic writes (write temp, rename)
//! - Corruption fallback (regenerate defaults if parse fails)
//! - Schema versioning with migration support
//! - Platform-specific config path

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::hotkey;

/// Current schema version.
const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Default config directory name.
const CONFIG_DIR_NAME: &str = "Trayward";

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.json";

/// Upper bound for each close-poll delay step.
const MAX_CLOSE_DELAY_MS: u64 = 2000;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Schema version for migrations.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Global hotkey settings.
    #[serde(default)]
    pub hotkey: HotkeyConfig,

    /// Minimize-hook collaborator settings.
    #[serde(default)]
    pub hook: HookConfig,

    /// Close-from-tray poll settings.
    #[serde(default)]
    pub close: CloseConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            hotkey: HotkeyConfig::default(),
            hook: HookConfig::default(),
            close: CloseConfig::default(),
        }
    }
}

impl AppConfig {
    /// Validate and clamp config values to valid ranges.
    pub fn validate_and_clamp(&mut self) {
        self.close.first_delay_ms = self.close.first_delay_ms.min(MAX_CLOSE_DELAY_MS);
        self.close.second_delay_ms = self.close.second_delay_ms.min(MAX_CLOSE_DELAY_MS);

        if self.hotkey.binding.is_empty() || hotkey::parse_hotkey(&self.hotkey.binding).is_err() {
            log::warn!(
                "invalid hotkey binding '{}', resetting to '{}'",
                self.hotkey.binding,
                HotkeyConfig::default().binding
            );
            self.hotkey.binding = HotkeyConfig::default().binding;
        }

        if self.hook.library.is_empty() {
            self.hook.library = HookConfig::default().library;
        }
    }
}

/// Global hotkey configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Whether the global hotkey is registered at all.
    pub enabled: bool,
    /// Binding string, e.g. "Ctrl+Alt+Down".
    pub binding: String,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binding: "Ctrl+Alt+Down".to_string(),
        }
    }
}

/// Minimize-hook collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    /// Whether the hook library is loaded at startup (`--no-hook` wins).
    pub enabled: bool,
    /// Hook library file name.
    pub library: String,
}

impl Default for HookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            library: "TraywardHook.dll".to_string(),
        }
    }
}

/// Close-from-tray poll configuration: two bounded delay steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloseConfig {
    pub first_delay_ms: u64,
    pub second_delay_ms: u64,
}

impl Default for CloseConfig {
    fn default() -> Self {
        Self {
            first_delay_ms: 50,
            second_delay_ms: 50,
        }
    }
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

/// Path of the config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

/// Load configuration, falling back to defaults on any failure.
pub fn load_config() -> AppConfig {
    load_config_from_path(&config_path())
}

/// Load configuration from a specific path (for testing).
pub fn load_config_from_path(path: &PathBuf) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<Value>(&content) {
            Ok(value) => {
                let mut config = migrate_config(value);
                config.validate_and_clamp();
                config
            }
            Err(e) => {
                log::error!("config parse error, using defaults: {}", e);
                // Backup corrupt file for debugging
                let backup = path.with_extension("json.corrupt");
                if let Err(backup_err) = fs::rename(path, &backup) {
                    log::warn!("failed to backup corrupt config: {}", backup_err);
                }
                AppConfig::default()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("no config file found, using defaults");
            AppConfig::default()
        }
        Err(e) => {
            log::error!("config read error, using defaults: {}", e);
            AppConfig::default()
        }
    }
}

/// Save configuration to disk atomically.
///
/// Writes to a temp file first, then renames to the final path.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to_path(config, &config_path())
}

/// Save configuration to a specific path (for testing).
pub fn save_config_to_path(config: &AppConfig, path: &PathBuf) -> Result<(), ConfigError> {
    let temp = path.with_extension("json.tmp");

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write to temp file
    let json = serde_json::to_string_pretty(config)?;
    fs::write(&temp, &json)?;

    // Atomic rename
    fs::rename(&temp, path)?;

    Ok(())
}

/// Migrate configuration from older schema versions.
fn migrate_config(mut config: Value) -> AppConfig {
    let version = config["schema_version"].as_u64().unwrap_or(0) as u32;

    if version < 1 {
        config["schema_version"] = serde_json::json!(1);
    }

    // Future migrations go here:
    // if version < 2 { ... }

    serde_json::from_value(config).unwrap_or_else(|e| {
        log::error!("config migration failed, using defaults: {}", e);
        AppConfig::default()
    })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
