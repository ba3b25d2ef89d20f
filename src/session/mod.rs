mod identity;
mod instance;
mod tool;

pub use identity::IdentityAllocator;
pub use instance::{Instance, LaunchCommand};
pub use tool::{IdentityFlags, ToolCapabilities, ToolKind};
