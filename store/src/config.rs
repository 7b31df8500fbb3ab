//! Configuration for the table metadata store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_TTL;
use crate::error::{MetadataError, Result};

/// Configuration for a [`MetadataStore`](crate::MetadataStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one metadata file per table.
    pub storage_dir: PathBuf,

    /// Time-to-live of cached records, in seconds.
    pub cache_ttl_secs: u64,

    /// Maximum number of cached tables (None = unbounded).
    pub cache_max_entries: Option<usize>,
}

impl StoreConfig {
    /// Create a new configuration with default cache settings.
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            cache_max_entries: None,
        }
    }

    /// Default storage directory (`~/.tablemeta/table_metadata`).
    pub fn default_storage_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".tablemeta").join("table_metadata"))
    }

    /// Load a configuration from a TOML file. Missing keys take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| MetadataError::Config(format!("{}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| MetadataError::Config(format!("{}: {e}", path.display())))
    }

    /// Set the storage directory.
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }

    /// Set the cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Bound the cache size.
    pub fn with_cache_max_entries(mut self, max_entries: usize) -> Self {
        self.cache_max_entries = Some(max_entries);
        self
    }

    /// Cache TTL as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(Self::default_storage_dir().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::new("/var/lib/tablemeta");

        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.cache_max_entries, None);
    }

    #[test]
    fn test_default_storage_dir_under_home() {
        if let Some(dir) = StoreConfig::default_storage_dir() {
            assert!(dir.ends_with(".tablemeta/table_metadata"));
        }
    }

    #[test]
    fn test_builder() {
        let config = StoreConfig::default()
            .with_storage_dir("/tmp/meta")
            .with_cache_ttl(Duration::from_secs(30))
            .with_cache_max_entries(64);

        assert_eq!(config.storage_dir, PathBuf::from("/tmp/meta"));
        assert_eq!(config.cache_ttl_secs, 30);
        assert_eq!(config.cache_max_entries, Some(64));
    }

    #[test]
    fn test_load_partial_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tablemeta.toml");
        fs::write(
            &path,
            "storage_dir = \"/srv/metadata\"\ncache_max_entries = 32\n",
        )
        .unwrap();

        let config = StoreConfig::load(&path).unwrap();

        assert_eq!(config.storage_dir, PathBuf::from("/srv/metadata"));
        assert_eq!(config.cache_ttl_secs, 600);
        assert_eq!(config.cache_max_entries, Some(32));
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tablemeta.toml");
        fs::write(&path, "cache_ttl_secs = \"ten minutes\"").unwrap();

        assert!(matches!(
            StoreConfig::load(&path),
            Err(MetadataError::Config(_))
        ));
    }
}
