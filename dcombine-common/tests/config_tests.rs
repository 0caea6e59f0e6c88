//! Configuration resolution tests
//!
//! Tests that touch DCOMBINE_* environment variables are marked #[serial]
//! so they never run in parallel with each other.

use dcombine_common::config::{
    load_toml_config, CliOverrides, Settings, TomlConfig, ENV_API_KEY, ENV_DATABASE, ENV_SNAPSHOT,
};
use dcombine_common::Error;
use serial_test::serial;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_env() {
    for var in [ENV_API_KEY, ENV_DATABASE, ENV_SNAPSHOT] {
        std::env::remove_var(var);
    }
}

fn toml_with_key(key: &str) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.api.api_key = Some(key.to_string());
    config.database_path = Some(PathBuf::from("/toml/dcombine.db"));
    config
}

#[test]
#[serial]
fn test_cli_overrides_env_and_toml() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "env-key");

    let cli = CliOverrides {
        api_key: Some("cli-key".to_string()),
        database: Some(PathBuf::from("/cli/dcombine.db")),
        ..Default::default()
    };
    let settings = Settings::from_layers(&cli, toml_with_key("toml-key")).unwrap();

    assert_eq!(settings.api.api_key.as_deref(), Some("cli-key"));
    assert_eq!(settings.database_path, PathBuf::from("/cli/dcombine.db"));
    clear_env();
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    std::env::set_var(ENV_API_KEY, "env-key");
    std::env::set_var(ENV_DATABASE, "/env/dcombine.db");

    let settings = Settings::from_layers(&CliOverrides::default(), toml_with_key("toml-key")).unwrap();

    assert_eq!(settings.api.api_key.as_deref(), Some("env-key"));
    assert_eq!(settings.database_path, PathBuf::from("/env/dcombine.db"));
    clear_env();
}

#[test]
#[serial]
fn test_toml_used_when_cli_and_env_absent() {
    clear_env();

    let settings = Settings::from_layers(&CliOverrides::default(), toml_with_key("toml-key")).unwrap();

    assert_eq!(settings.api.api_key.as_deref(), Some("toml-key"));
    assert_eq!(settings.database_path, PathBuf::from("/toml/dcombine.db"));
    assert!(settings.snapshot_path.ends_with("snapshot.json"));
}

#[test]
#[serial]
fn test_blank_key_is_treated_as_missing() {
    clear_env();

    let settings = Settings::from_layers(&CliOverrides::default(), toml_with_key("   ")).unwrap();

    assert!(settings.api.api_key.is_none());
    assert!(matches!(settings.require_api_key(), Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_page_size_above_remote_maximum_is_rejected() {
    clear_env();
    let mut config = TomlConfig::default();
    config.harvest.page_size = 501;

    let err = Settings::from_layers(&CliOverrides::default(), config).unwrap_err();
    assert!(matches!(err, Error::Config(ref msg) if msg.contains("page_size")));
}

#[test]
fn test_missing_toml_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = load_toml_config(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.harvest.page_size, 500);
    assert!(config.api.api_key.is_none());
}

#[test]
fn test_toml_file_is_parsed() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dcombine.toml");
    std::fs::write(
        &path,
        r#"
database_path = "/data/dcombine.db"

[api]
api_key = "file-key"

[harvest]
status = "ACTIVE"
page_size = 100

[logging]
level = "debug"
"#,
    )
    .unwrap();

    let config = load_toml_config(&path).unwrap();
    assert_eq!(config.database_path, Some(PathBuf::from("/data/dcombine.db")));
    assert_eq!(config.api.api_key.as_deref(), Some("file-key"));
    assert_eq!(config.harvest.status, "ACTIVE");
    assert_eq!(config.harvest.page_size, 100);
    assert_eq!(config.harvest.lists_uri, "/v2/lists");
    assert_eq!(config.logging.level, "debug");
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("dcombine.toml");
    std::fs::write(&path, "[harvest\npage_size = ").unwrap();

    assert!(matches!(load_toml_config(&path), Err(Error::Config(_))));
}
