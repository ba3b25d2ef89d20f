use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DeckError, Result};

// Busy patterns anchor a spinner glyph at line start, then whitespace and text.
// Startup banners reuse the same glyphs mid-line next to logo blocks, so an
// unanchored glyph match reports idle sessions as working.
const CLAUDE_SPINNER: &str = "·✢✳✶✻✽";
const BRAILLE_SPINNER: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Raw, uncompiled status patterns for one tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPatterns {
    /// Spinner lines printed while the agent works. Wins over every other group.
    pub busy: Vec<String>,
    /// Permission prompts and questions that block on the operator
    pub waiting: Vec<String>,
    /// Empty input prompt
    pub idle: Vec<String>,
}

/// Operator overrides for a tool's built-in patterns.
/// A group that is present replaces the built-in group wholesale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternOverrides {
    pub busy: Option<Vec<String>>,
    pub waiting: Option<Vec<String>>,
    pub idle: Option<Vec<String>>,
}

impl RawPatterns {
    pub fn with_overrides(mut self, overrides: &PatternOverrides) -> Self {
        if let Some(busy) = &overrides.busy {
            self.busy = busy.clone();
        }
        if let Some(waiting) = &overrides.waiting {
            self.waiting = waiting.clone();
        }
        if let Some(idle) = &overrides.idle {
            self.idle = idle.clone();
        }
        self
    }
}

fn spinner_line(glyphs: &str, tail: &str) -> String {
    format!(r"(?m)^[ \t]*[{glyphs}][ \t]+\S{tail}")
}

fn owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}

/// Built-in patterns for a tool, falling back to a generic shell set
pub fn default_raw_patterns(tool: &str) -> RawPatterns {
    match tool.to_ascii_lowercase().as_str() {
        "claude" => RawPatterns {
            busy: vec![
                spinner_line(CLAUDE_SPINNER, r"[^\n]*(?:…|\.\.\.)"),
                spinner_line(CLAUDE_SPINNER, r"[^\n]*esc to interrupt"),
            ],
            waiting: owned(&[
                r"Do you want to (?:proceed|make this edit|create|run|allow)",
                r"(?m)^[ \t]*❯[ \t]*1\.[ \t]+Yes",
                r"(?i)[\[(]y/n[\])]",
                r"Esc to cancel",
            ]),
            idle: owned(&[
                r"(?m)^[ \t]*[>❯][ \t]*$",
                r"\? for shortcuts",
            ]),
        },
        "gemini" => RawPatterns {
            busy: vec![
                spinner_line(BRAILLE_SPINNER, r"[^\n]*\(esc to cancel"),
                spinner_line(BRAILLE_SPINNER, r"[^\n]*(?:…|\.\.\.)"),
            ],
            waiting: owned(&[
                r"Allow execution\?",
                r"(?m)^[ \t]*●[ \t]*1\.[ \t]+Yes, allow once",
                r"(?i)[\[(]y/n[\])]",
            ]),
            idle: owned(&[
                r"Type your message",
                r"(?m)^[ \t]*>[ \t]*$",
            ]),
        },
        "codex" => RawPatterns {
            busy: vec![
                spinner_line("•◦", r"[^\n]*esc to interrupt"),
                spinner_line(BRAILLE_SPINNER, r"[^\n]*esc to interrupt"),
            ],
            waiting: owned(&[
                r"Allow command\?",
                r"(?m)^[ \t]*›[ \t]*1\.[ \t]+Yes",
                r"(?i)[\[(]y/n[\])]",
            ]),
            idle: owned(&[
                r"(?m)^[ \t]*[›▌][ \t]*$",
                r"(?m)^[ \t]*›[ \t]+Ask Codex",
            ]),
        },
        "opencode" => RawPatterns {
            busy: vec![spinner_line(BRAILLE_SPINNER, r"")],
            waiting: owned(&[r"(?i)permission required", r"(?i)[\[(]y/n[\])]"]),
            idle: owned(&[r"(?m)^[ \t]*>[ \t]*$", r"ctrl\+p commands"]),
        },
        _ => RawPatterns {
            busy: vec![spinner_line(BRAILLE_SPINNER, r"")],
            waiting: owned(&[
                r"(?i)[\[(]y/n[\])]",
                r"(?i)press enter to continue",
                r"(?i)password[^\n]*:[ \t]*$",
            ]),
            idle: owned(&[r"(?m)^[^\n]*[$#%❯>][ \t]*$"]),
        },
    }
}

/// Compiled, immutable pattern groups
#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    busy: Vec<Regex>,
    waiting: Vec<Regex>,
    idle: Vec<Regex>,
}

impl CompiledPatterns {
    pub fn busy(&self) -> &[Regex] {
        &self.busy
    }

    pub fn waiting(&self) -> &[Regex] {
        &self.waiting
    }

    pub fn idle(&self) -> &[Regex] {
        &self.idle
    }
}

fn compile_group(group: &'static str, patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| DeckError::Pattern {
                group,
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}

/// Compile every group; any invalid expression fails the whole set
pub fn compile_patterns(raw: &RawPatterns) -> Result<CompiledPatterns> {
    let compiled = CompiledPatterns {
        busy: compile_group("busy", &raw.busy)?,
        waiting: compile_group("waiting", &raw.waiting)?,
        idle: compile_group("idle", &raw.idle)?,
    };
    debug!(
        busy = compiled.busy.len(),
        waiting = compiled.waiting.len(),
        idle = compiled.idle.len(),
        "Compiled status patterns"
    );
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOOLS: [&str; 6] = ["claude", "gemini", "codex", "opencode", "shell", "aider"];

    fn any_busy(patterns: &CompiledPatterns, content: &str) -> bool {
        patterns.busy().iter().any(|re| re.is_match(content))
    }

    #[test]
    fn test_defaults_compile_for_every_tool() {
        for tool in TOOLS {
            let compiled = compile_patterns(&default_raw_patterns(tool));
            assert!(compiled.is_ok(), "{tool} patterns failed: {:?}", compiled.as_ref().err());
            assert!(!compiled.unwrap().busy().is_empty());
        }
    }

    #[test]
    fn test_unknown_tool_falls_back_to_generic() {
        assert_eq!(default_raw_patterns("aider"), default_raw_patterns("shell"));
        assert_eq!(default_raw_patterns("Claude"), default_raw_patterns("claude"));
    }

    #[test]
    fn test_banner_is_not_busy() {
        let compiled = compile_patterns(&default_raw_patterns("claude")).unwrap();
        let banner = [
            "  ▘▘ ▝▝    Opus 4.6 is here · $50 free extra usage · Try fast mode or use i…",
            " ▐▛███▜▌   Opus 4.6 · Claude Max",
            "▝▜█████▛▘  ~/.agent-deck/conductor/sre",
        ]
        .join("\n");

        for re in compiled.busy() {
            assert!(!re.is_match(&banner), "{} matched the banner", re.as_str());
        }
    }

    #[test]
    fn test_spinner_at_line_start_is_busy() {
        let compiled = compile_patterns(&default_raw_patterns("claude")).unwrap();
        for line in [
            "  ✳ Reading file…",
            "✢ Clauding…",
            "  · Thinking…",
            "✽ Brewing…",
            "✶ Compacting conversation... (esc to interrupt)",
        ] {
            assert!(any_busy(&compiled, line), "expected busy: {line:?}");
        }
    }

    #[test]
    fn test_spinner_glyph_alone_is_not_busy() {
        let compiled = compile_patterns(&default_raw_patterns("claude")).unwrap();
        assert!(!any_busy(&compiled, "·\nThinking…"));
        assert!(!any_busy(&compiled, "Total · 3 files…"));
    }

    #[test]
    fn test_banner_with_spinner_is_busy() {
        let compiled = compile_patterns(&default_raw_patterns("claude")).unwrap();
        let content = [
            "  ▘▘ ▝▝    Opus 4.6 is here · $50 free extra usage · Try fast mode or use i…",
            "",
            "✳ Reading file…",
        ]
        .join("\n");
        assert!(any_busy(&compiled, &content));
    }

    #[test]
    fn test_invalid_pattern_fails_whole_set() {
        let raw = RawPatterns {
            busy: vec![r"(?m)^[ \t]*⠋ ".to_string()],
            waiting: vec![r"(unclosed".to_string()],
            idle: vec![r">$".to_string()],
        };
        match compile_patterns(&raw) {
            Err(DeckError::Pattern { group, pattern, .. }) => {
                assert_eq!(group, "waiting");
                assert_eq!(pattern, "(unclosed");
            }
            other => panic!("expected pattern error, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides_replace_present_groups_only() {
        let overrides = PatternOverrides {
            idle: Some(vec![r"READY>".to_string()]),
            ..Default::default()
        };
        let base = default_raw_patterns("claude");
        let merged = base.clone().with_overrides(&overrides);
        assert_eq!(merged.idle, vec!["READY>".to_string()]);
        assert_eq!(merged.busy, base.busy);
        assert_eq!(merged.waiting, base.waiting);
    }
}
