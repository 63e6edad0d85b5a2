//! TOML-based configuration persistence for the device client.
//!
//! Reads and writes [`AppConfig`] to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\KeyRelay\config.toml`
//! - Linux:    `~/.config/keyrelay/config.toml`
//! - macOS:    `~/Library/Application Support/KeyRelay/config.toml`
//!
//! A typical file:
//!
//! ```toml
//! [relay]
//! log_level = "info"
//! connect_timeout_secs = 8
//! keepalive_interval_secs = 10
//! keepalive_timeout_secs = 20
//! backoff_base_ms = 2000
//! backoff_cap_ms = 30000
//!
//! [endpoints]
//! addresses = ["192.168.1.20", "100.64.0.7"]
//! port = 38745
//! ```
//!
//! Every `[relay]` field is optional (`#[serde(default = "...")]`), and the
//! `[endpoints]` table only exists once a set has been saved.  A missing file
//! is not an error: it yields [`AppConfig::default`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use keyrelay_core::{BackoffPolicy, EndpointSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::connection_manager::ManagerConfig;
use crate::application::endpoint_store::{EndpointStore, StoreError};
use crate::infrastructure::network::WsDialerConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

impl From<ConfigError> for StoreError {
    fn from(e: ConfigError) -> Self {
        StoreError::new(e.to_string())
    }
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level client configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub relay: RelayConfig,
    /// Last endpoint set supplied by pairing or the command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<EndpointSet>,
}

/// Connection tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seconds one candidate gets to open before the next is tried.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Seconds between keepalive pings on an open link (0 disables pings).
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    /// Seconds of silence from the desktop before the link is declared dead
    /// (0 disables the check).
    #[serde(default = "default_keepalive_timeout_secs")]
    pub keepalive_timeout_secs: u64,
    /// Backoff added per consecutive failed cycle, in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Upper bound on a single backoff, in milliseconds.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    8
}
fn default_keepalive_interval_secs() -> u64 {
    10
}
fn default_keepalive_timeout_secs() -> u64 {
    20
}
fn default_backoff_base_ms() -> u64 {
    2_000
}
fn default_backoff_cap_ms() -> u64 {
    30_000
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            connect_timeout_secs: default_connect_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            keepalive_timeout_secs: default_keepalive_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
        }
    }
}

impl RelayConfig {
    /// Connection manager settings described by this section.
    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            backoff: BackoffPolicy {
                base: Duration::from_millis(self.backoff_base_ms),
                cap: Duration::from_millis(self.backoff_cap_ms),
            },
        }
    }

    /// Socket keepalive settings described by this section.
    pub fn dialer_config(&self) -> WsDialerConfig {
        WsDialerConfig {
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs),
            keepalive_timeout: Duration::from_secs(self.keepalive_timeout_secs),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`AppConfig`] from `path`, returning the default if the file does
/// not exist yet.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the config from the platform default location.
///
/// # Errors
///
/// As [`load_config_from`], plus [`ConfigError::NoPlatformConfigDir`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Resolves the platform config base directory including the `KeyRelay`
/// subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("KeyRelay"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("keyrelay"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("KeyRelay")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Endpoint store adapter ────────────────────────────────────────────────────

/// [`EndpointStore`] backed by the `[endpoints]` table of a config file.
///
/// Saving rewrites the whole file but keeps the `[relay]` section intact.
#[derive(Debug, Clone)]
pub struct TomlEndpointStore {
    path: PathBuf,
}

impl TomlEndpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EndpointStore for TomlEndpointStore {
    fn load(&self) -> Result<Option<EndpointSet>, StoreError> {
        Ok(load_config_from(&self.path)?.endpoints)
    }

    fn save(&self, endpoints: &EndpointSet) -> Result<(), StoreError> {
        let mut config = load_config_from(&self.path)?;
        config.endpoints = Some(endpoints.clone());
        save_config_to(&self.path, &config)?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_config_path() -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("keyrelay_test_{}", Uuid::new_v4()));
        let path = dir.join("nested").join("config.toml");
        (dir, path)
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_relay_config_defaults_match_connection_constants() {
        // Arrange / Act
        let relay = RelayConfig::default();

        // Assert
        assert_eq!(relay.manager_config(), ManagerConfig::default());
        assert_eq!(relay.dialer_config(), WsDialerConfig::default());
        assert_eq!(relay.log_level, "info");
    }

    #[test]
    fn test_zero_keepalive_settings_pass_through_as_disabled() {
        // Arrange
        let toml_str = r#"
[relay]
keepalive_interval_secs = 0
keepalive_timeout_secs = 0
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize");
        let dialer = cfg.relay.dialer_config();

        // Assert
        assert!(dialer.keepalive_interval.is_zero());
        assert!(dialer.keepalive_timeout.is_zero());
    }

    #[test]
    fn test_app_config_default_has_no_endpoints() {
        assert_eq!(AppConfig::default().endpoints, None);
    }

    // ── TOML shape ────────────────────────────────────────────────────────────

    #[test]
    fn test_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_partial_relay_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[relay]
connect_timeout_secs = 3
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(
            cfg.relay.manager_config().connect_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(cfg.relay.keepalive_interval_secs, 10);
    }

    #[test]
    fn test_endpoints_table_parses() {
        let toml_str = r#"
[endpoints]
addresses = ["192.168.1.20", "100.64.0.7"]
port = 38745
"#;

        let cfg: AppConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(
            cfg.endpoints,
            Some(EndpointSet::new(["192.168.1.20", "100.64.0.7"], 38745))
        );
    }

    #[test]
    fn test_absent_endpoints_are_not_written() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).unwrap();
        assert!(!toml_str.contains("[endpoints]"));
        assert!(toml_str.contains("[relay]"));
    }

    #[test]
    fn test_invalid_toml_returns_parse_error() {
        // Arrange
        let (dir, path) = temp_config_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    // ── Files ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_from_missing_file_returns_default() {
        let (_dir, path) = temp_config_path();
        assert_eq!(load_config_from(&path).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let (dir, path) = temp_config_path();
        let mut cfg = AppConfig::default();
        cfg.relay.log_level = "debug".to_string();
        cfg.endpoints = Some(EndpointSet::new(["10.0.0.5"], 38745));

        // Act
        save_config_to(&path, &cfg).unwrap();
        let loaded = load_config_from(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_toml_store_save_preserves_relay_section() {
        // Arrange
        let (dir, path) = temp_config_path();
        let mut cfg = AppConfig::default();
        cfg.relay.connect_timeout_secs = 4;
        save_config_to(&path, &cfg).unwrap();
        let store = TomlEndpointStore::new(&path);

        // Act
        store
            .save(&EndpointSet::new(["10.0.0.5", "10.0.0.9"], 38745))
            .unwrap();

        // Assert
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.relay.connect_timeout_secs, 4);
        assert_eq!(
            store.load().unwrap(),
            Some(EndpointSet::new(["10.0.0.5", "10.0.0.9"], 38745))
        );
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_toml_store_without_file_loads_none() {
        let (_dir, path) = temp_config_path();
        let store = TomlEndpointStore::new(path);
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_config_error_converts_to_store_error() {
        let err: StoreError = ConfigError::NoPlatformConfigDir.into();
        assert_eq!(
            err.to_string(),
            "endpoint store failure: could not determine platform config directory"
        );
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
        // NoPlatformConfigDir is acceptable in a stripped CI environment.
    }
}
