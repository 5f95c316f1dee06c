//! Data folder resolution against the environment
//!
//! These tests mutate `WINGMAN_DATA_DIR` / `WINGMAN_API_KEY` and are
//! serialized with `serial_test`.

use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use wingman_common::config::{default_data_dir, AppConfig, API_KEY_ENV, DATA_DIR_ENV};

#[test]
#[serial]
fn test_env_var_beats_toml() {
    env::set_var(DATA_DIR_ENV, "/from/env");
    let config = AppConfig {
        data_dir: Some(PathBuf::from("/from/toml")),
        ..AppConfig::default()
    };
    assert_eq!(config.resolve_data_dir(None), PathBuf::from("/from/env"));
    assert_eq!(
        config.resolve_data_dir(Some(Path::new("/from/cli"))),
        PathBuf::from("/from/cli")
    );
    env::remove_var(DATA_DIR_ENV);
}

#[test]
#[serial]
fn test_toml_then_default() {
    env::remove_var(DATA_DIR_ENV);
    let config = AppConfig {
        data_dir: Some(PathBuf::from("/from/toml")),
        ..AppConfig::default()
    };
    assert_eq!(config.resolve_data_dir(None), PathBuf::from("/from/toml"));
    assert_eq!(AppConfig::default().resolve_data_dir(None), default_data_dir());
}

#[test]
#[serial]
fn test_load_file_with_api_key_override() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[inference]\nendpoint = \"http://localhost:9000/infer\"\napi_key = \"from-file\"\n\n[pipeline]\nquick_frame_count = 5"
    )
    .unwrap();

    env::remove_var(API_KEY_ENV);
    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.inference.endpoint, "http://localhost:9000/infer");
    assert_eq!(config.inference.api_key.as_deref(), Some("from-file"));
    assert_eq!(config.pipeline.quick_frame_count, 5);

    env::set_var(API_KEY_ENV, "from-env");
    let config = AppConfig::load(Some(file.path())).unwrap();
    assert_eq!(config.inference.api_key.as_deref(), Some("from-env"));
    env::remove_var(API_KEY_ENV);
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    assert!(AppConfig::load(Some(Path::new("/nonexistent/wingman.toml"))).is_err());
}
