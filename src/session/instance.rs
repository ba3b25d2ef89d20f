use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::identity::IdentityAllocator;
use super::tool::ToolKind;
use crate::error::{DeckError, Result};
use crate::tmux::{AgentStatus, StateInferenceEngine};

/// A command for the process launcher, run inside `workdir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: PathBuf,
}

impl LaunchCommand {
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args.iter().any(|arg| arg == flag)
    }

    /// Render as `cd <workdir> && <program> <args>` with shell quoting
    pub fn to_shell(&self) -> Result<String> {
        let workdir = self.workdir.to_string_lossy();
        let cd = shlex::try_quote(&workdir)
            .map_err(|e| DeckError::Validation(format!("cannot quote workdir: {e}")))?;
        let command = shlex::try_join(
            std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str)),
        )
        .map_err(|e| DeckError::Validation(format!("cannot quote command: {e}")))?;
        Ok(format!("cd {cd} && {command}"))
    }
}

/// A session of an agent tool in a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub title: String,
    pub project_path: PathBuf,
    pub tool: ToolKind,
    /// Empty until assigned at creation or observed from the running tool
    #[serde(default)]
    pub conversation_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub status: AgentStatus,
}

impl Instance {
    /// Create an instance, allocating a conversation ID from the global allocator
    /// when the tool supports resume
    pub fn new_with_tool(title: &str, project_path: impl AsRef<Path>, tool: &str) -> Self {
        Self::new_with_allocator(IdentityAllocator::global(), title, project_path, tool)
    }

    pub fn new_with_allocator(
        allocator: &IdentityAllocator,
        title: &str,
        project_path: impl AsRef<Path>,
        tool: &str,
    ) -> Self {
        let project_path = project_path.as_ref().to_path_buf();
        let tool = ToolKind::parse(tool);
        let conversation_id = if tool.capabilities().resumable() {
            allocator.allocate(&project_path)
        } else {
            String::new()
        };

        Self::build(title, project_path, tool, conversation_id)
    }

    /// Rebuild an instance for a conversation that already exists
    pub fn restore(
        allocator: &IdentityAllocator,
        title: &str,
        project_path: impl AsRef<Path>,
        tool: &str,
        conversation_id: &str,
    ) -> Result<Self> {
        let mut instance = Self::build(
            title,
            project_path.as_ref().to_path_buf(),
            ToolKind::parse(tool),
            String::new(),
        );
        instance.observe_conversation_id(allocator, conversation_id)?;
        Ok(instance)
    }

    fn build(title: &str, project_path: PathBuf, tool: ToolKind, conversation_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            project_path,
            tool,
            conversation_id,
            created_at: Utc::now(),
            status: AgentStatus::Unknown,
        }
    }

    pub fn can_fork(&self) -> bool {
        self.tool.capabilities().resumable() && !self.conversation_id.is_empty()
    }

    /// Command for the first launch of this session
    pub fn launch_command(&self) -> LaunchCommand {
        let caps = self.tool.capabilities();
        let mut args = Vec::new();
        if let Some(flags) = caps.identity {
            if !self.conversation_id.is_empty() {
                args.push(flags.session_id.to_string());
                args.push(self.conversation_id.clone());
            }
        }
        LaunchCommand {
            program: caps.command,
            args,
            workdir: self.project_path.clone(),
        }
    }

    /// Command to restart the session on its existing conversation
    pub fn resume_command(&self) -> Option<LaunchCommand> {
        let caps = self.tool.capabilities();
        let flags = caps.identity?;
        if self.conversation_id.is_empty() {
            return None;
        }
        Some(LaunchCommand {
            program: caps.command,
            args: vec![flags.resume.to_string(), self.conversation_id.clone()],
            workdir: self.project_path.clone(),
        })
    }

    /// New instance continuing this session's conversation.
    ///
    /// The fork starts without a conversation ID; the tool assigns one when the
    /// forked process starts and it is recorded via `observe_conversation_id`.
    pub fn create_forked_instance(
        &self,
        new_title: &str,
        new_path: Option<&Path>,
    ) -> Result<(Instance, LaunchCommand)> {
        let caps = self.tool.capabilities();
        let Some(flags) = caps.identity else {
            return Err(DeckError::Fork {
                title: self.title.clone(),
                reason: format!("{} does not support conversation resume", self.tool),
            });
        };
        if self.conversation_id.is_empty() {
            return Err(DeckError::Fork {
                title: self.title.clone(),
                reason: "session has no conversation id yet".to_string(),
            });
        }

        let project_path = new_path
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.project_path.clone());

        let forked = Self::build(new_title, project_path, self.tool.clone(), String::new());
        let command = LaunchCommand {
            program: caps.command,
            args: vec![
                flags.resume.to_string(),
                self.conversation_id.clone(),
                flags.fork.to_string(),
            ],
            workdir: forked.project_path.clone(),
        };

        info!(
            parent = %self.title,
            child = %forked.title,
            from = %self.conversation_id,
            "Created forked session"
        );
        Ok((forked, command))
    }

    /// Record the conversation ID the running tool reported
    pub fn observe_conversation_id(&mut self, allocator: &IdentityAllocator, id: &str) -> Result<()> {
        if id.is_empty() || id == self.conversation_id {
            return Ok(());
        }
        allocator.record(&self.project_path, id)?;
        if !self.conversation_id.is_empty() {
            allocator.release(&self.project_path, &self.conversation_id);
        }
        debug!(title = %self.title, id, "Observed conversation id");
        self.conversation_id = id.to_string();
        Ok(())
    }

    /// Give the conversation ID back to the allocator when the session is removed
    pub fn release_identity(&mut self, allocator: &IdentityAllocator) -> bool {
        if self.conversation_id.is_empty() {
            return false;
        }
        let released = allocator.release(&self.project_path, &self.conversation_id);
        debug!(title = %self.title, id = %self.conversation_id, "Released conversation id");
        self.conversation_id.clear();
        released
    }

    /// Reclassify from a fresh pane snapshot
    pub fn update_status(&mut self, engine: &StateInferenceEngine, snapshot: &str) -> AgentStatus {
        self.status = engine.analyze(snapshot);
        self.status
    }
}
