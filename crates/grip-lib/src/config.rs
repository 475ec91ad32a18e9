//! Shell configuration: where the recordings live and how access is gated.
//!
//! Resolution order (first file found wins):
//! 1. Explicit path from `--config`
//! 2. `$GRIP_CONFIG` environment variable
//! 3. Project-local `grip.toml` in the current working directory
//! 4. Global `~/.config/grip/config.toml`
//! 5. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::Deserialize;

use crate::error::{Error, Result};

/// Default listing/download memoization window.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

/// Top-level configuration. All fields optional so a partial file works.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Store root: a directory for local browsing, or a remote folder id.
    pub root: Option<String>,
    /// Listing/download memoization TTL in seconds.
    pub cache_ttl_secs: Option<u64>,
    /// SHA-256 hex digest the GUI gate checks passwords against;
    /// absent means no gate.
    pub access_hash: Option<String>,
}

impl Config {
    /// Loads configuration. An explicit path must exist and parse; the
    /// discovered candidates are skipped with a warning when they do not.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        for path in candidate_paths() {
            if !path.is_file() {
                continue;
            }
            match Self::from_file(&path) {
                Ok(config) => {
                    debug!("config loaded from {}", path.display());
                    return Ok(config);
                }
                Err(err) => warn!("skipping config {}: {err}", path.display()),
            }
        }
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .map_err(|err| Error::Config(format!("{}: {err}", path.display())))?;
        toml::from_str(&content).map_err(|err| Error::Config(format!("{}: {err}", path.display())))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs.unwrap_or(DEFAULT_CACHE_TTL_SECS))
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(env_path) = std::env::var("GRIP_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join("grip.toml"));
    }
    if let Some(config_dir) = dirs_next::config_dir() {
        paths.push(config_dir.join("grip").join("config.toml"));
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.root.is_none());
        assert!(config.access_hash.is_none());
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn parses_all_fields() {
        let config: Config = toml::from_str(
            r#"
root = "/data/recordings"
cache_ttl_secs = 120
access_hash = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8"
"#,
        )
        .unwrap();
        assert_eq!(config.root.as_deref(), Some("/data/recordings"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(120));
        assert_eq!(config.access_hash.as_ref().map(String::len), Some(64));
    }

    #[test]
    fn explicit_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grip.toml");
        fs::write(&path, "root = \"./recordings\"\ncache_ttl_secs = 60\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.root.as_deref(), Some("./recordings"));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn missing_explicit_file_is_a_config_error() {
        let err = Config::from_file(Path::new("/nonexistent/grip.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(&path, "root = [not toml").unwrap();
        assert!(matches!(Config::from_file(&path), Err(Error::Config(_))));
    }
}
