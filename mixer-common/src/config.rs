//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the root folder
pub const ROOT_ENV_VAR: &str = "MIXER_ROOT";

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "MIXER_CONFIG";

const APP_DIR: &str = "mixer";

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. `root_folder` key of the TOML config file
/// 4. OS-dependent default
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config_file: Option<&Path>,
) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    if let Some(config_path) = config_file {
        if let Ok(toml_content) = std::fs::read_to_string(config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    Ok(default_root_folder())
}

/// Locate the config file: explicit path, then `MIXER_CONFIG`, then the user config dir
///
/// Returns `None` when no file exists; an explicit path that does not exist is an error.
pub fn resolve_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!("Config file not found: {:?}", path)));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(Error::Config(format!(
            "{} points to missing file {:?}",
            CONFIG_ENV_VAR, path
        )));
    }

    let user_config = dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"));
    Ok(user_config.filter(|p| p.exists()))
}

/// Parse a TOML config file into `T`; no file means `T::default()`
pub fn load_toml<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        debug!("No config file, using defaults");
        return Ok(T::default());
    };

    let content = std::fs::read_to_string(path)?;
    let parsed = toml::from_str::<T>(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {:?}: {}", path, e)))?;
    debug!(path = %path.display(), "Loaded config file");
    Ok(parsed)
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./mixer_data"))
}

/// Create the root folder if it does not exist yet
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        debug!(root = %root.display(), "Created root folder");
    }
    Ok(())
}
