//! Store-level configuration.
//!
//! All fields are optional; defaults are applied at read time through the
//! effective-value accessors. A `config.toml` at the store's base directory
//! overrides the defaults for every partition registered without explicit
//! settings.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, ErrorKind};
use std::path::Path;

use crate::cache::DEFAULT_CACHE_CAPACITY;

/// Defaults applied to partitions registered without explicit settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Cache capacity for partitions that pass none at registration.
    /// Zero disables caching store-wide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_cache_capacity: Option<usize>,
}

impl StoreConfig {
    /// Returns the effective cache capacity.
    #[inline]
    pub fn cache_capacity(&self) -> usize {
        self.default_cache_capacity
            .unwrap_or(DEFAULT_CACHE_CAPACITY)
    }

    /// Load `config.toml` from the base directory, falling back to defaults
    /// when the file is absent. A file that exists but does not parse is an
    /// error — silently ignoring a present config would be worse.
    pub fn load(base_dir: &Path) -> io::Result<Self> {
        let path = base_dir.join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        toml::from_str(&content).map_err(|e| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("Failed to parse config: {}", e),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_apply_when_unset() {
        let config = StoreConfig::default();
        assert_eq!(config.cache_capacity(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn explicit_capacity_wins() {
        let config = StoreConfig {
            default_cache_capacity: Some(25),
        };
        assert_eq!(config.cache_capacity(), 25);
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::load(dir.path()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn load_parses_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "default_cache_capacity = 7\n").unwrap();
        let config = StoreConfig::load(dir.path()).unwrap();
        assert_eq!(config.cache_capacity(), 7);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "default_cache_capacity = [[[").unwrap();
        let err = StoreConfig::load(dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
