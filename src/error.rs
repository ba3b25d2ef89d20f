use thiserror::Error;

/// Errors raised by the agent-deck core
#[derive(Debug, Error)]
pub enum DeckError {
    /// Bad conductor name, settings value or identity
    #[error("validation error: {0}")]
    Validation(String),

    /// A status pattern failed to compile
    #[error("invalid {group} pattern {pattern:?}: {source}")]
    Pattern {
        group: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Fork requested on a session that cannot be forked
    #[error("cannot fork session '{title}': {reason}")]
    Fork { title: String, reason: String },

    /// Path that cannot be used (relative custom path and friends)
    #[error("path error: {0}")]
    Path(String),

    /// Missing or malformed configuration
    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeckError>;
