//! Unit tests for configuration and graceful degradation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate SAU_ROOT_FOLDER or SAU_CONFIG are marked with #[serial].

use sau_common::config::{
    default_root_folder, load_toml_config, resolve_config_path, RootFolder, RootFolderResolver,
    CONFIG_FILE_ENV, ROOT_FOLDER_ENV,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize, PartialEq)]
struct SampleConfig {
    root_folder: Option<PathBuf>,
    #[serde(default)]
    port: u16,
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new().resolve();

    assert!(!root_folder.as_os_str().is_empty());
    assert_eq!(root_folder, default_root_folder());
}

#[test]
#[serial]
fn test_resolver_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/sau-test-env-folder");

    let root_folder = RootFolderResolver::new()
        .with_toml_value(Some(PathBuf::from("/tmp/sau-from-toml")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/sau-test-env-folder"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_cli_beats_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/sau-test-env-folder");

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/sau-from-cli")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/sau-from-cli"));
    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_resolver_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new()
        .with_toml_value(Some(PathBuf::from("/tmp/sau-from-toml")))
        .resolve();

    assert_eq!(root_folder, PathBuf::from("/tmp/sau-from-toml"));
}

#[test]
#[serial]
fn test_config_path_explicit_then_env() {
    env::set_var(CONFIG_FILE_ENV, "/tmp/sau-env.toml");

    let explicit = resolve_config_path(Some(Path::new("/tmp/explicit.toml")), "sau-login");
    assert_eq!(explicit, Some(PathBuf::from("/tmp/explicit.toml")));

    let from_env = resolve_config_path(None, "sau-login");
    assert_eq!(from_env, Some(PathBuf::from("/tmp/sau-env.toml")));

    env::remove_var(CONFIG_FILE_ENV);
}

#[test]
fn test_missing_toml_file_yields_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config: SampleConfig = load_toml_config(&temp_dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, SampleConfig::default());
}

#[test]
fn test_toml_file_is_parsed() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sau-login.toml");
    std::fs::write(&path, "root_folder = \"/data/sau\"\nport = 5409\n").unwrap();

    let config: SampleConfig = load_toml_config(&path).unwrap();
    assert_eq!(config.root_folder, Some(PathBuf::from("/data/sau")));
    assert_eq!(config.port, 5409);
}

#[test]
fn test_malformed_toml_is_config_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broken.toml");
    std::fs::write(&path, "port = = 1").unwrap();

    let result: sau_common::Result<SampleConfig> = load_toml_config(&path);
    assert!(matches!(result, Err(sau_common::Error::Config(_))));
}

#[test]
fn test_root_folder_initializer_creates_directories() {
    let temp_dir = TempDir::new().unwrap();
    let root = RootFolder::new(temp_dir.path().join("sau"));

    root.ensure_directory_exists().unwrap();

    assert!(root.path().is_dir());
    assert!(root.path().join("db").is_dir());
    assert!(root.path().join("cookies").is_dir());
    assert!(root.database_path().starts_with(root.path()));
}
