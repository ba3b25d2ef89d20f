//! Conductors: named, persisted bridges between a chat channel and agent sessions.

mod messages;
mod paths;
mod registry;
mod settings;

pub use messages::{MessageDirection, MessageLogEntry, MessageRoute, MessageStatus};
pub use paths::ConfigRoot;
pub use registry::{
    conductor_session_title, validate_conductor_name, ConductorMeta, ConductorRegistry,
    CLAUDE_MD_FILE, HEARTBEAT_SCRIPT, MAX_CONDUCTOR_NAME_LEN, META_FILE,
};
pub use settings::{ConductorSettings, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_PROFILE};
