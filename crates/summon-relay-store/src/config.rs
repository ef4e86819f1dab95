//! Relay configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use summon_relay_core::{RelayError, Result};

use crate::wait::PollWindow;

/// Name of the results directory inside the assets root
pub const RESULTS_DIR_NAME: &str = "mcp_results";

/// Configuration for the relay's storage and waits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    /// Root of creature and model assets
    pub assets_dir: PathBuf,
    /// Queue directory; `<assets_dir>/mcp_results` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_dir: Option<PathBuf>,
    /// Wait for a queued result
    pub result_poll: PollWindow,
    /// Wait for a creature's files
    pub summon_poll: PollWindow,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            results_dir: None,
            result_poll: PollWindow::result(),
            summon_poll: PollWindow::summon(),
        }
    }
}

impl RelayConfig {
    /// Default configuration rooted at a custom assets directory
    pub fn with_assets_dir(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            ..Default::default()
        }
    }

    /// Load a JSON configuration file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RelayError::storage(format!("read config {}", path.display()), e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.results_dir
            .clone()
            .unwrap_or_else(|| self.assets_dir.join(RESULTS_DIR_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.assets_dir, PathBuf::from("assets"));
        assert_eq!(config.results_dir(), PathBuf::from("assets/mcp_results"));
        assert_eq!(config.result_poll, PollWindow::result());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("relay.json");
        std::fs::write(
            &path,
            r#"{"assetsDir": "/srv/summons", "resultPoll": {"intervalMs": 250, "maxAttempts": 8}}"#,
        )
        .unwrap();

        let config = RelayConfig::load(&path).unwrap();
        assert_eq!(config.assets_dir, PathBuf::from("/srv/summons"));
        assert_eq!(config.results_dir(), PathBuf::from("/srv/summons/mcp_results"));
        assert_eq!(config.result_poll, PollWindow::new(250, 8));
        assert_eq!(config.summon_poll, PollWindow::summon());
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let err = RelayConfig::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, RelayError::Storage(_)));
    }
}
