//! Configuration file location and root folder resolution

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Environment variable naming the folder that holds songs
pub const ROOT_FOLDER_ENV: &str = "BMBB_ROOT_FOLDER";

/// Config file name looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. Environment variable
/// 3. TOML config file value
/// 4. OS-dependent compiled default
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Locate the bootstrap config file.
///
/// An explicit path must exist. Without one, the user config directory is
/// tried first, then the system-wide location. `Ok(None)` means no file was
/// found and built-in defaults apply.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::NotFound(path.to_path_buf()));
    }

    let user_config = dirs::config_dir().map(|d| d.join("bmbb").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.is_file() {
            return Ok(Some(path));
        }
    }

    let system_config = PathBuf::from("/etc/bmbb").join(CONFIG_FILE_NAME);
    if system_config.is_file() {
        return Ok(Some(system_config));
    }

    Ok(None)
}

/// Read a config file into a string, mapping a missing file to `NotFound`
pub fn read_config_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("bmbb"))
        .unwrap_or_else(|| PathBuf::from("./bmbb_data"))
}
