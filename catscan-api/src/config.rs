//! Service configuration for catscan-api
//!
//! Each setting resolves CLI → environment → TOML → compiled default. The
//! TOML file holds the shared bootstrap keys at the top level plus
//! `[recognition]`, `[artifact_store]` and `[upload]` sections:
//!
//! ```toml
//! root_folder = "/var/lib/catscan"
//! port = 5780
//!
//! [logging]
//! level = "debug"
//!
//! [recognition]
//! base_url = "http://vision:5000"
//! recognize_timeout_secs = 15
//!
//! [artifact_store]
//! base_url = "http://files:8080"
//! bucket = "scans"
//! ```

use catscan_common::config::{LoggingConfig, TomlConfig};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::services::artifact_store::{DEFAULT_ARTIFACT_TIMEOUT, DEFAULT_BUCKET};
use crate::services::recognition_gateway::{
    GatewaySettings, DEFAULT_RECOGNIZE_RETRIES, DEFAULT_RECOGNIZE_TIMEOUT, DEFAULT_REMOVE_BG_TIMEOUT,
};
use crate::services::upload_validator::{UploadRules, DEFAULT_MAX_UPLOAD_BYTES};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5780;
pub const DEFAULT_RECOGNITION_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_ARTIFACT_STORE_URL: &str = "http://127.0.0.1:8080";

pub const ENV_HOST: &str = "CATSCAN_HOST";
pub const ENV_PORT: &str = "CATSCAN_PORT";
pub const ENV_RECOGNITION_URL: &str = "CATSCAN_RECOGNITION_URL";
pub const ENV_ARTIFACT_STORE_URL: &str = "CATSCAN_ARTIFACT_STORE_URL";
pub const ENV_ARTIFACT_BUCKET: &str = "CATSCAN_ARTIFACT_BUCKET";
pub const ENV_MAX_UPLOAD_BYTES: &str = "CATSCAN_MAX_UPLOAD_BYTES";
pub const ENV_LOG_LEVEL: &str = "CATSCAN_LOG_LEVEL";

/// Full TOML file layout
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ServiceToml {
    #[serde(flatten)]
    pub bootstrap: TomlConfig,
    #[serde(default)]
    pub recognition: RecognitionToml,
    #[serde(default)]
    pub artifact_store: ArtifactStoreToml,
    #[serde(default)]
    pub upload: UploadToml,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct RecognitionToml {
    pub base_url: Option<String>,
    pub recognize_timeout_secs: Option<u64>,
    pub remove_bg_timeout_secs: Option<u64>,
    pub recognize_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ArtifactStoreToml {
    pub base_url: Option<String>,
    pub bucket: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct UploadToml {
    pub max_bytes: Option<usize>,
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub root_folder: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub recognition_url: Option<String>,
    pub artifact_store_url: Option<String>,
    pub log_level: Option<String>,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub root_folder: PathBuf,
    pub host: String,
    pub port: u16,
    pub logging: LoggingConfig,
    pub recognition: GatewaySettings,
    pub artifact_store_url: String,
    pub artifact_bucket: String,
    pub artifact_timeout: Duration,
    pub upload_rules: UploadRules,
}

impl ServiceConfig {
    /// Resolve every setting from its tiers
    pub fn resolve(cli: CliOverrides, toml: ServiceToml) -> Self {
        let root_folder = catscan_common::config::RootFolderResolver::new("catscan-api")
            .with_cli_arg(cli.root_folder)
            .with_toml_value(toml.bootstrap.root_folder.clone())
            .resolve();

        let host = pick("host", cli.host, env_string(ENV_HOST), toml.bootstrap.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = pick("port", cli.port, env_parsed(ENV_PORT), toml.bootstrap.port).unwrap_or(DEFAULT_PORT);

        let mut logging = toml.bootstrap.logging.clone();
        if let Some(level) = pick("log level", cli.log_level, env_string(ENV_LOG_LEVEL), None) {
            logging.level = level;
        }

        let recognition_url = pick(
            "recognition url",
            cli.recognition_url,
            env_string(ENV_RECOGNITION_URL),
            toml.recognition.base_url.clone(),
        )
        .unwrap_or_else(|| DEFAULT_RECOGNITION_URL.to_string());

        let recognition = GatewaySettings {
            base_url: recognition_url,
            recognize_timeout: toml
                .recognition
                .recognize_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RECOGNIZE_TIMEOUT),
            remove_bg_timeout: toml
                .recognition
                .remove_bg_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REMOVE_BG_TIMEOUT),
            recognize_retries: toml.recognition.recognize_retries.unwrap_or(DEFAULT_RECOGNIZE_RETRIES),
        };

        let artifact_store_url = pick(
            "artifact store url",
            cli.artifact_store_url,
            env_string(ENV_ARTIFACT_STORE_URL),
            toml.artifact_store.base_url.clone(),
        )
        .unwrap_or_else(|| DEFAULT_ARTIFACT_STORE_URL.to_string());

        let artifact_bucket = pick(
            "artifact bucket",
            None,
            env_string(ENV_ARTIFACT_BUCKET),
            toml.artifact_store.bucket.clone(),
        )
        .unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let max_bytes = pick(
            "max upload bytes",
            None,
            env_parsed(ENV_MAX_UPLOAD_BYTES),
            toml.upload.max_bytes,
        )
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Self {
            root_folder,
            host,
            port,
            logging,
            recognition,
            artifact_store_url,
            artifact_bucket,
            artifact_timeout: toml
                .artifact_store
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ARTIFACT_TIMEOUT),
            upload_rules: UploadRules::with_max_bytes(max_bytes),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            root_folder: catscan_common::config::CompiledDefaults::for_current_platform().root_folder,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            logging: LoggingConfig::default(),
            recognition: GatewaySettings::new(DEFAULT_RECOGNITION_URL),
            artifact_store_url: DEFAULT_ARTIFACT_STORE_URL.to_string(),
            artifact_bucket: DEFAULT_BUCKET.to_string(),
            artifact_timeout: DEFAULT_ARTIFACT_TIMEOUT,
            upload_rules: UploadRules::default(),
        }
    }
}

/// First present tier wins
fn pick<T>(name: &str, cli: Option<T>, env: Option<T>, toml: Option<T>) -> Option<T> {
    if cli.is_some() {
        info!("{} taken from command line", name);
        return cli;
    }
    if env.is_some() {
        info!("{} taken from environment", name);
        return env;
    }
    toml
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={}", key, raw);
            None
        }
    }
}
