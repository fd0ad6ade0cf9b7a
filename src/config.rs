//! config
//!
//! Project-level configuration, stored as `config.toml` inside the
//! reserved project directory.
//!
//! A missing file means defaults; unknown keys are preserved-by-ignore
//! so older binaries can open newer projects.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RugError};

/// Name of the config file inside the reserved project directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Built-in default branch used when a remote's HEAD is ambiguous.
const DEFAULT_BRANCH: &str = "master";

/// Per-project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Branch to assume when a remote has several branches at its HEAD
    /// sha and git refuses to pick one. Upstream git guesses in that
    /// situation; we make the fallback explicit and configurable.
    pub default_branch: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            default_branch: DEFAULT_BRANCH.to_string(),
        }
    }
}

impl ProjectConfig {
    /// Load configuration from `dir/config.toml`, falling back to
    /// defaults when the file does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        toml::from_str(&text).map_err(|e| RugError::malformed(format!("{}: {}", path.display(), e)))
    }

    /// Write configuration to `dir/config.toml`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| RugError::malformed(format!("config serialization: {}", e)))?;
        fs::write(dir.join(CONFIG_FILE), text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(config.default_branch, "master");
    }

    #[test]
    fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let config = ProjectConfig {
            default_branch: "main".to_string(),
        };
        config.save(dir.path()).unwrap();
        let loaded = ProjectConfig::load(dir.path()).unwrap();
        assert_eq!(loaded.default_branch, "main");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "default_branch = [").unwrap();
        assert!(ProjectConfig::load(dir.path()).is_err());
    }
}
