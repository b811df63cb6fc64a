use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level runtime configuration (§6): the event-log data directory, the
/// log output directory, and per-source tracker request pacing. Loaded from
/// `config.toml` under the resolved data path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data_path: Option<PathBuf>,
    #[serde(default)]
    pub logs_folder: Option<PathBuf>,
    /// `JIRA_REQUEST_DELAY_SECONDS` equivalent: pacing for the (external)
    /// tracker client this core never calls directly (§6).
    #[serde(default)]
    pub request_delay_seconds: Option<u64>,
    #[serde(default)]
    pub enable_mermaid_charts: bool,
}

impl Config {
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolve the effective data path: explicit config value, else the
    /// standard `DATA_PATH`/OS-default resolution in `flowcast_core`.
    pub fn resolve_data_path(&self) -> std::result::Result<PathBuf, flowcast_core::Error> {
        match &self.data_path {
            Some(p) => Ok(p.clone()),
            None => flowcast_core::resolve_data_path(None),
        }
    }

    pub fn resolve_logs_path(&self, data_path: &std::path::Path) -> PathBuf {
        match &self.logs_folder {
            Some(p) => p.clone(),
            None => flowcast_core::resolve_logs_path(data_path, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_nonexistent_returns_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert!(config.data_path.is_none());
        assert!(!config.enable_mermaid_charts);
    }

    #[test]
    fn round_trips_through_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.request_delay_seconds = Some(2);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.request_delay_seconds, Some(2));
    }
}
