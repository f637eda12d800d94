//! Root folder resolution and config file loading
//!
//! Tests that touch MIXER_ROOT / MIXER_CONFIG are marked #[serial] so they never race on
//! the process environment.

use mixer_common::config::{
    default_root_folder, ensure_root_folder, load_toml, resolve_config_file, resolve_root_folder,
    CONFIG_ENV_VAR, ROOT_ENV_VAR,
};
use serde::Deserialize;
use serial_test::serial;
use std::env;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
struct SampleConfig {
    root_folder: Option<String>,
    level: String,
}

#[test]
#[serial]
fn test_cli_argument_wins() {
    env::set_var(ROOT_ENV_VAR, "/tmp/mixer-from-env");
    let root = resolve_root_folder(Some("/tmp/mixer-from-cli"), ROOT_ENV_VAR, None).unwrap();
    assert_eq!(root, PathBuf::from("/tmp/mixer-from-cli"));
    env::remove_var(ROOT_ENV_VAR);
}

#[test]
#[serial]
fn test_env_var_beats_config_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(&config_path, "root_folder = \"/tmp/mixer-from-toml\"\n").unwrap();

    env::set_var(ROOT_ENV_VAR, "/tmp/mixer-from-env");
    let root = resolve_root_folder(None, ROOT_ENV_VAR, Some(&config_path)).unwrap();
    assert_eq!(root, PathBuf::from("/tmp/mixer-from-env"));
    env::remove_var(ROOT_ENV_VAR);

    let root = resolve_root_folder(None, ROOT_ENV_VAR, Some(&config_path)).unwrap();
    assert_eq!(root, PathBuf::from("/tmp/mixer-from-toml"));
}

#[test]
#[serial]
fn test_falls_back_to_default_root() {
    env::remove_var(ROOT_ENV_VAR);
    let root = resolve_root_folder(None, ROOT_ENV_VAR, None).unwrap();
    assert_eq!(root, default_root_folder());
    assert!(!root.as_os_str().is_empty());
}

#[test]
#[serial]
fn test_config_file_resolution() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("mixer.toml");
    std::fs::write(&config_path, "level = \"debug\"\n").unwrap();

    assert_eq!(
        resolve_config_file(Some(&config_path)).unwrap(),
        Some(config_path.clone())
    );
    assert!(resolve_config_file(Some(&dir.path().join("missing.toml"))).is_err());

    env::set_var(CONFIG_ENV_VAR, &config_path);
    assert_eq!(resolve_config_file(None).unwrap(), Some(config_path));
    env::remove_var(CONFIG_ENV_VAR);
}

#[test]
fn test_load_toml_defaults_and_errors() {
    let missing: SampleConfig = load_toml(None).unwrap();
    assert_eq!(missing, SampleConfig::default());

    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.toml");
    std::fs::write(&good, "level = \"warn\"\n").unwrap();
    let parsed: SampleConfig = load_toml(Some(&good)).unwrap();
    assert_eq!(parsed.level, "warn");
    assert!(parsed.root_folder.is_none());

    let bad = dir.path().join("bad.toml");
    std::fs::write(&bad, "level = [unclosed\n").unwrap();
    assert!(load_toml::<SampleConfig>(Some(&bad)).is_err());
}

#[test]
fn test_ensure_root_folder_creates_directory() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("nested").join("root");
    ensure_root_folder(&root).unwrap();
    assert!(root.is_dir());
}
