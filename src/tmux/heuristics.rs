use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::patterns::{compile_patterns, default_raw_patterns, CompiledPatterns, PatternOverrides};
use crate::error::Result;

/// Status of an AI agent session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Agent is waiting at an empty prompt
    Idle,
    /// Agent is actively processing (spinning, thinking)
    Busy,
    /// Agent is blocked on the operator (confirmation, question)
    Waiting,
    /// Status cannot be determined
    #[default]
    Unknown,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Waiting => "waiting",
            AgentStatus::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

static RE_ANSI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|\][^\x07\x1b]*(?:\x07|\x1b\\)|[@-Z\\-_])")
        .expect("Invalid ANSI escape regex")
});

/// Remove CSI/OSC escape sequences from captured pane output
pub fn strip_ansi(content: &str) -> String {
    RE_ANSI.replace_all(content, "").into_owned()
}

/// Engine for inferring agent status from pane content
#[derive(Debug, Clone)]
pub struct StateInferenceEngine {
    patterns: Arc<CompiledPatterns>,
}

impl StateInferenceEngine {
    pub fn new(patterns: Arc<CompiledPatterns>) -> Self {
        Self { patterns }
    }

    /// Build an engine from a tool's built-in patterns
    pub fn for_tool(tool: &str) -> Result<Self> {
        let compiled = compile_patterns(&default_raw_patterns(tool))?;
        Ok(Self::new(Arc::new(compiled)))
    }

    /// Analyze pane content and determine agent status
    pub fn analyze(&self, content: &str) -> AgentStatus {
        // Priority order: Busy > Waiting > Idle > Unknown.
        // A banner next to a live spinner must still read as busy.
        if self.patterns.busy().iter().any(|re| re.is_match(content)) {
            return AgentStatus::Busy;
        }

        if self.patterns.waiting().iter().any(|re| re.is_match(content)) {
            return AgentStatus::Waiting;
        }

        if self.patterns.idle().iter().any(|re| re.is_match(content)) {
            return AgentStatus::Idle;
        }

        AgentStatus::Unknown
    }
}

/// Per-tool engines, compiled on first use and shared across sessions
#[derive(Debug, Default)]
pub struct StatusClassifier {
    overrides: HashMap<String, PatternOverrides>,
    engines: RwLock<HashMap<String, StateInferenceEngine>>,
}

impl StatusClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use operator overrides keyed by tool name
    pub fn with_overrides(overrides: HashMap<String, PatternOverrides>) -> Self {
        let overrides = overrides
            .into_iter()
            .map(|(tool, o)| (tool.to_ascii_lowercase(), o))
            .collect();
        Self {
            overrides,
            engines: RwLock::default(),
        }
    }

    pub fn engine_for(&self, tool: &str) -> Result<StateInferenceEngine> {
        let key = tool.to_ascii_lowercase();
        if let Some(engine) = self.read_engines().get(&key) {
            return Ok(engine.clone());
        }

        let mut raw = default_raw_patterns(&key);
        if let Some(overrides) = self.overrides.get(&key) {
            raw = raw.with_overrides(overrides);
        }
        let engine = StateInferenceEngine::new(Arc::new(compile_patterns(&raw)?));
        debug!(tool = %key, "Cached status engine");

        let mut engines = self
            .engines
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(engines.entry(key).or_insert(engine).clone())
    }

    /// Classify a snapshot for the given tool
    pub fn classify(&self, tool: &str, content: &str) -> Result<AgentStatus> {
        Ok(self.engine_for(tool)?.analyze(content))
    }

    fn read_engines(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, StateInferenceEngine>> {
        self.engines
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
