//! Unit tests for bootstrap configuration and graceful degradation
//!
//! Tests that manipulate CATSCAN_* environment variables are marked #[serial]
//! so they never race each other.

use catscan_common::config::{
    load_toml_file, load_toml_or_default, CompiledDefaults, LoggingConfig, RootFolderInitializer,
    RootFolderResolver, TomlConfig, ENV_ROOT_FOLDER,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("catscan") || defaults.root_folder.ends_with("catscan_data"));
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ENV_ROOT_FOLDER);

    let root_folder = RootFolderResolver::new("test-module").resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/catscan-test-env-folder");

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_value(Some(PathBuf::from("/tmp/catscan-from-toml")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/catscan-test-env-folder"));

    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_resolver_cli_arg_beats_env_var() {
    env::set_var(ENV_ROOT_FOLDER, "/tmp/catscan-priority-2");

    let root_folder = RootFolderResolver::new("test-module")
        .with_cli_arg(Some(PathBuf::from("/tmp/catscan-priority-1")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/catscan-priority-1"));

    env::remove_var(ENV_ROOT_FOLDER);
}

#[test]
#[serial]
fn test_resolver_toml_value_used_without_env() {
    env::remove_var(ENV_ROOT_FOLDER);

    let root_folder = RootFolderResolver::new("test-module")
        .with_toml_value(Some(PathBuf::from("/srv/catscan")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/srv/catscan"));
}

#[test]
fn test_initializer_database_path() {
    let root = PathBuf::from("/tmp/catscan-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("catscan.db"));
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("a").join("b");

    let initializer = RootFolderInitializer::new(root.clone());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(initializer.ensure_directory_exists().is_ok());
    assert!(root.is_dir());
}

#[test]
fn test_toml_config_parses_bootstrap_fields() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
root_folder = "/var/lib/catscan"
port = 5799

[logging]
level = "debug"
file = "/var/log/catscan.log"
"#
    )
    .unwrap();

    let config: TomlConfig = load_toml_file(file.path()).unwrap();

    assert_eq!(config.root_folder, Some(PathBuf::from("/var/lib/catscan")));
    assert_eq!(config.port, Some(5799));
    assert_eq!(config.host, None);
    assert_eq!(
        config.logging,
        LoggingConfig {
            level: "debug".to_string(),
            file: Some(PathBuf::from("/var/log/catscan.log")),
        }
    );
}

#[test]
fn test_toml_config_logging_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = 1234").unwrap();

    let config: TomlConfig = load_toml_file(file.path()).unwrap();
    assert_eq!(config.logging, LoggingConfig::default());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_missing_config_file_falls_back_to_default() {
    let config: TomlConfig =
        load_toml_or_default(Some(PathBuf::from("/nonexistent/catscan/config.toml").as_path()));
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_broken_config_file_falls_back_to_default() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "port = \"not a number").unwrap();

    assert!(load_toml_file::<TomlConfig>(file.path()).is_err());
    let config: TomlConfig = load_toml_or_default(Some(file.path()));
    assert_eq!(config, TomlConfig::default());
}
