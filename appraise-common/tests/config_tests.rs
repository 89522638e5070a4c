//! Tests for root folder resolution priority and config file loading
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate APPRAISE_ROOT_FOLDER are marked with #[serial].

use appraise_common::config::{
    resolve_root_folder, RootFolderInitializer, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/appraise-env-root");
    let config = TomlConfig {
        root_folder: Some("/tmp/appraise-toml-root".to_string()),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/appraise-env-root"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_toml_used_without_env() {
    env::remove_var(ROOT_FOLDER_ENV);
    let config = TomlConfig {
        root_folder: Some("/tmp/appraise-toml-root".to_string()),
        ..Default::default()
    };

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &config);
    assert_eq!(root, PathBuf::from("/tmp/appraise-toml-root"));
}

#[test]
#[serial]
fn test_default_when_nothing_configured() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root = resolve_root_folder(None, ROOT_FOLDER_ENV, &TomlConfig::default());
    assert!(!root.as_os_str().is_empty());
    assert!(root.to_string_lossy().contains("appraise"));
}

#[test]
fn test_config_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "log_level = \"warn\"\n").unwrap();

    let config = TomlConfig::from_file(&path).unwrap();
    assert_eq!(config.log_level(), "warn");
    assert!(config.root_folder.is_none());
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = TomlConfig::from_file(&dir.path().join("absent.toml"));
    assert!(matches!(result, Err(appraise_common::Error::Io(_))));
}

#[test]
fn test_initializer_creates_folders() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("nested").join("root");
    let init = RootFolderInitializer::new(root.clone());

    init.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
    assert!(init.xml_folder().is_dir());
}
