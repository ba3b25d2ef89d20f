use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::paths::ConfigRoot;
use super::settings::{ConductorSettings, DEFAULT_PROFILE};
use crate::error::{DeckError, Result};
use crate::fsutil::write_atomic;
use crate::template::render;

pub const MAX_CONDUCTOR_NAME_LEN: usize = 64;
pub const META_FILE: &str = "meta.json";
pub const CLAUDE_MD_FILE: &str = "CLAUDE.md";
pub const HEARTBEAT_SCRIPT: &str = "heartbeat.sh";
pub const MESSAGE_LOG_FILE: &str = "messages.jsonl";

static CONDUCTOR_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]*$").expect("Invalid conductor name regex")
});

const SHARED_CLAUDE_MD: &str = r#"# Conductor

You are a conductor: a long-running agent-deck session that receives messages
from a chat bridge and coordinates the other agent sessions of its profile.

## Ground rules

- Answer bridge messages briefly; long output belongs in a session, not chat.
- Use `agent-deck status` to see which sessions are busy, idle or waiting.
- Never approve destructive actions in another session without asking first.
- On a heartbeat, check for sessions waiting on input and report them.
"#;

const CONDUCTOR_CLAUDE_MD: &str = r#"# Conductor: __NAME__

Profile: `__PROFILE__`

__DESCRIPTION__

Shared conductor instructions live in `__SHARED__`.
Add instructions specific to this conductor below.
"#;

const HEARTBEAT_SCRIPT_TEMPLATE: &str = r#"#!/usr/bin/env bash
# Heartbeat for conductor __NAME__ (profile __PROFILE__). Generated by agent-deck.
set -euo pipefail

SESSION="__SESSION__"

if ! tmux has-session -t "$SESSION" 2>/dev/null; then
    exit 0
fi

tmux send-keys -t "$SESSION" -l "Heartbeat: check your sessions and report anything waiting on input."
tmux send-keys -t "$SESSION" Enter
"#;

/// Check a conductor name: alphanumeric start, then alphanumerics, `.`, `_`, `-`
pub fn validate_conductor_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DeckError::Validation(
            "conductor name cannot be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_CONDUCTOR_NAME_LEN {
        return Err(DeckError::Validation(format!(
            "conductor name is longer than {MAX_CONDUCTOR_NAME_LEN} characters"
        )));
    }
    if !CONDUCTOR_NAME_REGEX.is_match(name) {
        return Err(DeckError::Validation(format!(
            "invalid conductor name {name:?}: must start with a letter or digit and contain only letters, digits, '.', '_' or '-'"
        )));
    }
    Ok(())
}

/// Title of the agent session a conductor runs in
pub fn conductor_session_title(name: &str) -> String {
    format!("conductor-{name}")
}

/// Persisted conductor metadata (`meta.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConductorMeta {
    pub name: String,
    pub profile: String,
    pub heartbeat_enabled: bool,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Custom CLAUDE.md location, stored as given (may start with `~/`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_md_path: Option<String>,
}

/// Conductors stored under `~/.agent-deck/conductor/<name>/`
#[derive(Debug)]
pub struct ConductorRegistry {
    root: ConfigRoot,
    settings: ConductorSettings,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConductorRegistry {
    pub fn new(root: ConfigRoot) -> Self {
        Self::with_settings(root, ConductorSettings::default())
    }

    pub fn with_settings(root: ConfigRoot, settings: ConductorSettings) -> Self {
        Self {
            root,
            settings,
            locks: Mutex::default(),
        }
    }

    pub fn root(&self) -> &ConfigRoot {
        &self.root
    }

    pub fn settings(&self) -> &ConductorSettings {
        &self.settings
    }

    pub fn conductor_dir(&self, name: &str) -> PathBuf {
        self.root.conductor_dir().join(name)
    }

    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.conductor_dir(name).join(META_FILE)
    }

    pub fn default_claude_md_path(&self, name: &str) -> PathBuf {
        self.conductor_dir(name).join(CLAUDE_MD_FILE)
    }

    pub fn heartbeat_script_path(&self, name: &str) -> PathBuf {
        self.conductor_dir(name).join(HEARTBEAT_SCRIPT)
    }

    pub fn message_log_path(&self, name: &str) -> PathBuf {
        self.conductor_dir(name).join(MESSAGE_LOG_FILE)
    }

    /// Shared CLAUDE.md, honoring the `[conductor] claude_md_path` override
    pub fn get_shared_claude_md_path(&self) -> Result<PathBuf> {
        match self.settings.claude_md_path.as_deref() {
            Some(raw) if !raw.is_empty() => self.root.expand_path(raw),
            _ => Ok(self.root.conductor_dir().join(CLAUDE_MD_FILE)),
        }
    }

    /// Resolve where a conductor's CLAUDE.md lives given its metadata
    pub fn resolve_claude_md_path(&self, meta: &ConductorMeta) -> Result<PathBuf> {
        match meta.claude_md_path.as_deref() {
            Some(raw) if !raw.is_empty() => self.root.expand_path(raw),
            _ => Ok(self.default_claude_md_path(&meta.name)),
        }
    }

    /// CLAUDE.md path for a conductor; the default path when it has no metadata yet
    pub async fn get_conductor_claude_md_path(&self, name: &str) -> Result<PathBuf> {
        validate_conductor_name(name)?;
        match self.read_meta(name).await? {
            Some(meta) => self.resolve_claude_md_path(&meta),
            None => Ok(self.default_claude_md_path(name)),
        }
    }

    pub async fn load_conductor_meta(&self, name: &str) -> Result<ConductorMeta> {
        validate_conductor_name(name)?;
        self.read_meta(name).await?.ok_or_else(|| {
            DeckError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("conductor '{name}' is not set up"),
            ))
        })
    }

    /// Create or refresh a conductor.
    ///
    /// Existing CLAUDE.md files are left untouched; metadata is written last so
    /// a failed setup never leaves a half-configured conductor behind.
    pub async fn setup_conductor(
        &self,
        name: &str,
        profile: &str,
        heartbeat_enabled: bool,
        description: &str,
        custom_claude_md: Option<&str>,
    ) -> Result<ConductorMeta> {
        validate_conductor_name(name)?;
        let custom_claude_md = custom_claude_md
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);
        let claude_md = match custom_claude_md.as_deref() {
            Some(raw) => self.root.expand_path(raw)?,
            None => self.default_claude_md_path(name),
        };
        let shared = self.get_shared_claude_md_path()?;
        let profile = if profile.is_empty() {
            DEFAULT_PROFILE
        } else {
            profile
        };

        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let existing = self.read_meta(name).await?;
        tokio::fs::create_dir_all(self.conductor_dir(name)).await?;

        if ensure_document(&shared, SHARED_CLAUDE_MD.to_string()).await? {
            debug!(path = %shared.display(), "Wrote shared CLAUDE.md");
        }
        let shared_display = shared.to_string_lossy().into_owned();
        let document = render(
            CONDUCTOR_CLAUDE_MD,
            &[
                ("NAME", name),
                ("PROFILE", profile),
                ("DESCRIPTION", description),
                ("SHARED", shared_display.as_str()),
            ],
        );
        if ensure_document(&claude_md, document).await? {
            debug!(path = %claude_md.display(), "Wrote conductor CLAUDE.md");
        }

        let meta = ConductorMeta {
            name: name.to_string(),
            profile: profile.to_string(),
            heartbeat_enabled,
            description: description.to_string(),
            created_at: existing.map(|m| m.created_at).unwrap_or_else(Utc::now),
            claude_md_path: custom_claude_md,
        };
        self.sync_heartbeat_script(&meta).await?;
        self.write_meta(&meta).await?;

        info!(conductor = %name, profile = %meta.profile, heartbeat = heartbeat_enabled, "Conductor set up");
        Ok(meta)
    }

    /// Apply a change to a conductor's metadata and persist it
    pub async fn update_conductor<F>(&self, name: &str, update: F) -> Result<ConductorMeta>
    where
        F: FnOnce(&mut ConductorMeta),
    {
        validate_conductor_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let mut meta = self.load_conductor_meta(name).await?;
        let created_at = meta.created_at;
        update(&mut meta);
        meta.name = name.to_string();
        meta.created_at = created_at;
        if meta.profile.is_empty() {
            meta.profile = DEFAULT_PROFILE.to_string();
        }
        self.resolve_claude_md_path(&meta)?;

        self.sync_heartbeat_script(&meta).await?;
        self.write_meta(&meta).await?;
        info!(conductor = %name, "Conductor updated");
        Ok(meta)
    }

    /// Remove a conductor's directory. Custom CLAUDE.md files elsewhere stay.
    ///
    /// The per-name lock stays in the table: a setup queued behind this
    /// teardown must share it with any setup that starts afterwards.
    pub async fn teardown_conductor(&self, name: &str) -> Result<bool> {
        validate_conductor_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        let removed = match tokio::fs::remove_dir_all(self.conductor_dir(name)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };

        if removed {
            info!(conductor = %name, "Conductor removed");
        }
        Ok(removed)
    }

    /// All conductors with readable metadata, sorted by name
    pub async fn list_conductors(&self) -> Result<Vec<ConductorMeta>> {
        let dir = self.root.conductor_dir();
        let meta_files = tokio::task::spawn_blocking(move || find_meta_files(&dir))
            .await
            .map_err(std::io::Error::other)?;

        let mut conductors = Vec::new();
        for path in meta_files {
            match read_meta_file(&path).await {
                Ok(Some(meta)) => conductors.push(meta),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable conductor"),
            }
        }
        conductors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(conductors)
    }

    async fn read_meta(&self, name: &str) -> Result<Option<ConductorMeta>> {
        read_meta_file(&self.meta_path(name)).await
    }

    async fn write_meta(&self, meta: &ConductorMeta) -> Result<()> {
        let json = serde_json::to_string_pretty(meta)?;
        write_atomic(&self.meta_path(&meta.name), json, None).await
    }

    /// Write the heartbeat script when heartbeat is on, remove it when off
    async fn sync_heartbeat_script(&self, meta: &ConductorMeta) -> Result<()> {
        let path = self.heartbeat_script_path(&meta.name);
        if !meta.heartbeat_enabled {
            return match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(conductor = %meta.name, "Removed heartbeat script");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            };
        }

        let session = conductor_session_title(&meta.name);
        let script = render(
            HEARTBEAT_SCRIPT_TEMPLATE,
            &[
                ("NAME", meta.name.as_str()),
                ("PROFILE", meta.profile.as_str()),
                ("SESSION", session.as_str()),
            ],
        );
        write_atomic(&path, script, Some(0o755)).await
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.lock_table().entry(name.to_string()).or_default())
    }

    fn lock_table(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<tokio::sync::Mutex<()>>>> {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn read_meta_file(path: &Path) -> Result<Option<ConductorMeta>> {
    match tokio::fs::read_to_string(path).await {
        Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write a document only if nothing exists at `path` yet
async fn ensure_document(path: &Path, contents: String) -> Result<bool> {
    if tokio::fs::try_exists(path).await? {
        return Ok(false);
    }
    write_atomic(path, contents, None).await?;
    Ok(true)
}

fn find_meta_files(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == META_FILE)
        .map(|entry| entry.into_path())
        .collect()
}
