//! Bootstrap configuration and root folder resolution
//!
//! Bootstrap values are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never aborts startup; it is logged and
//! compiled defaults are used instead.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ENV_ROOT_FOLDER: &str = "CATSCAN_ROOT_FOLDER";

/// Environment variable overriding the TOML config path
pub const ENV_CONFIG_PATH: &str = "CATSCAN_CONFIG";

/// Database file created inside the root folder
pub const DATABASE_FILE_NAME: &str = "catscan.db";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Bootstrap configuration shared by every service
///
/// Services embed this with `#[serde(flatten)]` next to their own sections.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Root folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP bind host (e.g. "127.0.0.1")
    #[serde(default)]
    pub host: Option<String>,

    /// HTTP port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default location of the TOML config file
///
/// `CATSCAN_CONFIG` wins; otherwise `<config dir>/catscan/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("catscan").join("config.toml"))
}

/// Parse a TOML file into `T`
///
/// Returns `Error::Config` if the file cannot be read or parsed.
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load a TOML file, falling back to `T::default()` when it is absent or broken
pub fn load_toml_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> T {
    let Some(path) = path else {
        return T::default();
    };

    if !path.exists() {
        info!("Config file not found at {}, using defaults", path.display());
        return T::default();
    }

    match load_toml_file(path) {
        Ok(config) => {
            info!("Loaded config file {}", path.display());
            config
        }
        Err(e) => {
            warn!("{}; using defaults", e);
            T::default()
        }
    }
}

/// Resolves the root folder for a service
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_value: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml_value(mut self, path: Option<PathBuf>) -> Self {
        self.toml_value = path;
        self
    }

    /// Resolve using CLI → ENV → TOML → compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ENV_ROOT_FOLDER) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ENV_ROOT_FOLDER, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_value {
            info!(module = %self.module_name, "Root folder from TOML: {}", path.display());
            return path.clone();
        }

        let path = CompiledDefaults::for_current_platform().root_folder;
        info!(module = %self.module_name, "Root folder from compiled default: {}", path.display());
        path
    }
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("catscan"))
        .unwrap_or_else(|| PathBuf::from("./catscan_data"))
}
