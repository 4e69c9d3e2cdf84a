//! Config path resolution for clusterlevel
//!
//! # Environment Variables
//!
//! - `CLUSTERLEVEL_CONFIG_DIR` - Override config directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `CLUSTERLEVEL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/clusterlevel` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\clusterlevel`
//!    - macOS/Linux: `~/.config/clusterlevel`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "CLUSTERLEVEL_CONFIG_DIR";

const APP_DIR: &str = "clusterlevel";
const CONFIG_FILE: &str = "config.toml";

/// Get the clusterlevel config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            return Ok(app_data.join(APP_DIR));
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Path of the TOML config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/keys/id_ed25519"), home.join("keys/id_ed25519"));
    }

    #[test]
    fn test_expand_leaves_absolute_paths() {
        assert_eq!(expand("/etc/ssh/key"), PathBuf::from("/etc/ssh/key"));
    }

    #[test]
    fn test_config_file_name() {
        let file = config_file().unwrap();
        assert_eq!(file.file_name().unwrap(), "config.toml");
    }
}
