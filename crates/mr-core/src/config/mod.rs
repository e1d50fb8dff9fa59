//! Configuration loading
//!
//! The hub reads a TOML file; every section falls back to its default, so
//! a missing or partial file still yields a runnable configuration.

mod hub;

pub use hub::{DispatchConfig, HubConfig, SimTransportConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Default configuration file path (`~/.config/m-relay/hub.toml`)
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("m-relay")
        .join("hub.toml")
}

/// Load a configuration file, failing on absence or malformed TOML
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_config_is_not_found() {
        let err = load_config::<HubConfig>(Path::new("/nonexistent/hub.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_written_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(
            &path,
            "bind_address = \"0.0.0.0:9000\"\nreconnect_delay = 2\n",
        )
        .unwrap();
        let loaded: HubConfig = load_config(&path).unwrap();
        assert_eq!(loaded.bind_address, "0.0.0.0:9000");
        assert_eq!(loaded.reconnect_delay, std::time::Duration::from_secs(2));
    }
}
