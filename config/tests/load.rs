use std::fs;

use backoffice_config::{BackofficeConfig, ConfigError};

#[test]
fn missing_file_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = BackofficeConfig::load_from(&dir.path().join("config.toml")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn file_under_missing_directory_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backoffice").join("config.toml");
    assert!(BackofficeConfig::load_from(&path).unwrap().is_none());
}

#[test]
fn loads_and_builds_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[api]\nbase_url = \"http://localhost:8080\"\n\n[editor]\nhistory_limit = 10\n",
    )
    .unwrap();

    let config = BackofficeConfig::load_from(&path).unwrap().unwrap();
    let session = config.session_config_with(|_| None).unwrap();
    assert_eq!(session.base_url().as_str(), "http://localhost:8080/");
    assert_eq!(config.editor_settings().history_limit, Some(10));
}

#[test]
fn malformed_file_reports_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[api\nbase_url = ").unwrap();

    let err = BackofficeConfig::load_from(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert_eq!(err.path(), Some(path.as_path()));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn directory_in_place_of_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = BackofficeConfig::load_from(dir.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}
