//! Status detection for captured tmux pane content.
//!
//! Pattern sets are data: each tool gets a built-in [`RawPatterns`] that
//! operators can override, compiled once and shared read-only.

mod heuristics;
mod patterns;

pub use heuristics::{strip_ansi, AgentStatus, StateInferenceEngine, StatusClassifier};
pub use patterns::{
    compile_patterns, default_raw_patterns, CompiledPatterns, PatternOverrides, RawPatterns,
};
