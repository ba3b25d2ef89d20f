use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::conductor::{ConductorSettings, ConfigRoot};
use crate::error::{DeckError, Result};
use crate::tmux::{PatternOverrides, StatusClassifier};

/// Contents of `~/.agent-deck/config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    pub conductor: ConductorSettings,
    /// Status pattern overrides keyed by tool name
    pub patterns: HashMap<String, PatternOverrides>,
}

impl DeckConfig {
    /// Load the config under `root`; a missing file means defaults
    pub fn load(root: &ConfigRoot) -> Result<Self> {
        let path = root.config_file();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DeckError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents)
            .map_err(|e| DeckError::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn status_classifier(&self) -> StatusClassifier {
        StatusClassifier::with_overrides(self.patterns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tmux::AgentStatus;

    #[test]
    fn test_missing_file_uses_defaults() {
        let home = tempfile::tempdir().unwrap();
        let config = DeckConfig::load(&ConfigRoot::with_home(home.path())).unwrap();
        assert_eq!(config, DeckConfig::default());
        assert_eq!(config.conductor.get_heartbeat_interval(), 15);
    }

    #[test]
    fn test_parses_conductor_and_patterns() {
        let home = tempfile::tempdir().unwrap();
        let root = ConfigRoot::with_home(home.path());
        std::fs::create_dir_all(root.deck_dir()).unwrap();
        std::fs::write(
            root.config_file(),
            r#"
[conductor]
enabled = true
heartbeat_interval = 30
profiles = ["work", "personal"]
claude_md_path = "~/conductor/CLAUDE.md"

[patterns.claude]
idle = ['(?m)^READY$']
"#,
        )
        .unwrap();

        let config = DeckConfig::load(&root).unwrap();
        assert!(config.conductor.enabled);
        assert_eq!(config.conductor.get_heartbeat_interval(), 30);
        assert_eq!(config.conductor.get_profiles(), vec!["work", "personal"]);
        assert_eq!(
            config.conductor.claude_md_path.as_deref(),
            Some("~/conductor/CLAUDE.md")
        );

        let classifier = config.status_classifier();
        assert_eq!(classifier.classify("claude", "READY").unwrap(), AgentStatus::Idle);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[conductor\nenabled = ").unwrap();
        assert!(matches!(
            DeckConfig::load_from_path(&path),
            Err(DeckError::Config(_))
        ));
    }
}
