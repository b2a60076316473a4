//! Configuration loading for the honor ledger
//!
//! Resolution priority for the database path:
//! 1. Environment variable (`HOH_DATABASE_PATH`)
//! 2. TOML config file
//! 3. OS-dependent compiled default

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default TTL for cached category listings (seconds)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 600;

/// TOML configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TomlConfig {
    /// Path to the SQLite database file
    pub database_path: Option<PathBuf>,
    /// TTL for cached read-model pages and category listings (seconds)
    pub cache_ttl_secs: Option<u64>,
}

/// Resolved runtime configuration
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub database_path: PathBuf,
    pub cache_ttl_secs: u64,
}

impl LedgerConfig {
    /// Resolve configuration from environment and optional TOML file
    pub fn resolve(config_path: Option<&Path>) -> Result<Self> {
        let toml_config = match config_path {
            Some(path) => load_toml_config(path)?,
            None => default_config_path()
                .filter(|p| p.exists())
                .map(|p| load_toml_config(&p))
                .transpose()?
                .unwrap_or_default(),
        };

        let database_path = if let Ok(path) = std::env::var("HOH_DATABASE_PATH") {
            PathBuf::from(path)
        } else if let Some(path) = toml_config.database_path {
            path
        } else {
            default_database_path()
        };

        let cache_ttl_secs = toml_config.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS);

        Ok(Self {
            database_path,
            cache_ttl_secs,
        })
    }
}

/// Load and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read config failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse config failed ({}): {}", path.display(), e)))
}

/// Default configuration file path for the platform (~/.config/hoh/config.toml)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("hoh").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("hoh").join("honor_ledger.db"))
        .unwrap_or_else(|| PathBuf::from("./honor_ledger.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_toml_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/ledger.db\"").unwrap();
        writeln!(file, "cache_ttl_secs = 120").unwrap();
        file.flush().unwrap();

        let config = load_toml_config(file.path()).unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/ledger.db")));
        assert_eq!(config.cache_ttl_secs, Some(120));
    }

    #[test]
    fn test_resolve_defaults_ttl() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = \"/tmp/ledger.db\"").unwrap();
        file.flush().unwrap();

        let config = LedgerConfig::resolve(Some(file.path())).unwrap();
        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "database_path = [not valid").unwrap();
        file.flush().unwrap();

        let result = load_toml_config(file.path());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
