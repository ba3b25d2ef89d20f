//! Session lifecycle core for AI coding agents running in tmux: status
//! detection from pane snapshots, conversation identity and forking, and
//! conductor management with heartbeat daemons.

pub mod conductor;
pub mod config;
pub mod daemon;
pub mod error;
pub mod session;
pub mod tmux;

mod fsutil;
mod template;

pub use error::{DeckError, Result};
