use std::fmt;

use serde::{Deserialize, Serialize};

/// Agent CLI a session runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolKind {
    Claude,
    Gemini,
    Codex,
    OpenCode,
    Shell,
    Other(String),
}

/// Flags a tool uses to pin, resume and fork conversations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityFlags {
    /// Assigns a fresh conversation ID on a new launch
    pub session_id: &'static str,
    pub resume: &'static str,
    /// Only valid together with `resume`
    pub fork: &'static str,
}

/// What a tool supports, looked up by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCapabilities {
    pub command: String,
    /// `None` when the tool has no resumable conversation identity
    pub identity: Option<IdentityFlags>,
}

impl ToolCapabilities {
    pub fn resumable(&self) -> bool {
        self.identity.is_some()
    }
}

const CLAUDE_FLAGS: IdentityFlags = IdentityFlags {
    session_id: "--session-id",
    resume: "--resume",
    fork: "--fork-session",
};

impl ToolKind {
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "claude" => ToolKind::Claude,
            "gemini" => ToolKind::Gemini,
            "codex" => ToolKind::Codex,
            "opencode" => ToolKind::OpenCode,
            "shell" | "" => ToolKind::Shell,
            other => ToolKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ToolKind::Claude => "claude",
            ToolKind::Gemini => "gemini",
            ToolKind::Codex => "codex",
            ToolKind::OpenCode => "opencode",
            ToolKind::Shell => "shell",
            ToolKind::Other(name) => name,
        }
    }

    pub fn capabilities(&self) -> ToolCapabilities {
        match self {
            ToolKind::Claude => ToolCapabilities {
                command: "claude".to_string(),
                identity: Some(CLAUDE_FLAGS),
            },
            ToolKind::Shell => ToolCapabilities {
                command: std::env::var("SHELL").unwrap_or_else(|_| "bash".to_string()),
                identity: None,
            },
            other => ToolCapabilities {
                command: other.as_str().to_string(),
                identity: None,
            },
        }
    }
}

impl From<String> for ToolKind {
    fn from(name: String) -> Self {
        ToolKind::parse(&name)
    }
}

impl From<ToolKind> for String {
    fn from(tool: ToolKind) -> Self {
        tool.as_str().to_string()
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for name in ["claude", "gemini", "codex", "opencode", "shell", "aider"] {
            assert_eq!(ToolKind::parse(name).as_str(), name);
        }
        assert_eq!(ToolKind::parse("Claude "), ToolKind::Claude);
        assert_eq!(ToolKind::parse(""), ToolKind::Shell);
    }

    #[test]
    fn test_only_claude_is_resumable() {
        assert!(ToolKind::Claude.capabilities().resumable());
        for tool in [ToolKind::Gemini, ToolKind::Codex, ToolKind::OpenCode, ToolKind::Shell] {
            assert!(!tool.capabilities().resumable(), "{tool} should not be resumable");
        }
        assert!(!ToolKind::parse("aider").capabilities().resumable());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let json = serde_json::to_string(&ToolKind::OpenCode).unwrap();
        assert_eq!(json, "\"opencode\"");
        let parsed: ToolKind = serde_json::from_str("\"aider\"").unwrap();
        assert_eq!(parsed, ToolKind::Other("aider".to_string()));
    }
}
