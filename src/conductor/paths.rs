use std::path::{Path, PathBuf};

use crate::error::{DeckError, Result};

/// Filesystem root everything under `~/.agent-deck` hangs off.
///
/// Resolved once and passed in, so tests can point it at a temp dir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRoot {
    home: PathBuf,
}

impl ConfigRoot {
    /// Use the current user's home directory
    pub fn detect() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "cannot determine home directory",
            )
        })?;
        Ok(Self::with_home(home))
    }

    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn deck_dir(&self) -> PathBuf {
        self.home.join(".agent-deck")
    }

    pub fn conductor_dir(&self) -> PathBuf {
        self.deck_dir().join("conductor")
    }

    pub fn config_file(&self) -> PathBuf {
        self.deck_dir().join("config.toml")
    }

    /// Expand a leading `~` and require the result to be absolute
    pub fn expand_path(&self, raw: &str) -> Result<PathBuf> {
        let expanded = if raw == "~" {
            self.home.clone()
        } else if let Some(rest) = raw.strip_prefix("~/") {
            self.home.join(rest)
        } else {
            PathBuf::from(raw)
        };

        if !expanded.is_absolute() {
            return Err(DeckError::Path(format!(
                "path {raw:?} must be absolute or start with ~/"
            )));
        }
        Ok(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> ConfigRoot {
        ConfigRoot::with_home("/home/deck")
    }

    #[test]
    fn test_derived_dirs() {
        let root = root();
        assert_eq!(root.deck_dir(), PathBuf::from("/home/deck/.agent-deck"));
        assert_eq!(
            root.conductor_dir(),
            PathBuf::from("/home/deck/.agent-deck/conductor")
        );
        assert_eq!(
            root.config_file(),
            PathBuf::from("/home/deck/.agent-deck/config.toml")
        );
    }

    #[test]
    fn test_expand_tilde() {
        let root = root();
        assert_eq!(
            root.expand_path("~/notes/conductor.md").unwrap(),
            PathBuf::from("/home/deck/notes/conductor.md")
        );
        assert_eq!(root.expand_path("~").unwrap(), PathBuf::from("/home/deck"));
    }

    #[test]
    fn test_absolute_passes_through() {
        assert_eq!(
            root().expand_path("/etc/agent/CLAUDE.md").unwrap(),
            PathBuf::from("/etc/agent/CLAUDE.md")
        );
    }

    #[test]
    fn test_relative_is_rejected() {
        for raw in ["relative/path.md", "~other/file.md", "./x.md", ""] {
            let err = root().expand_path(raw).unwrap_err();
            assert!(matches!(err, DeckError::Path(_)));
            assert!(err.to_string().contains("absolute"), "{err}");
        }
    }
}
