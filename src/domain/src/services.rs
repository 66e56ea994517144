//! Collaborator contracts consumed by the plan execution engine.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use shared::error::Result;
use std::path::Path;

/// Outcome reported by a filesystem write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
}

/// Project-relative file access.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a file. Fails with `Error::NotFound` when the file is absent.
    async fn read(&self, path: &str, project_root: &Path) -> Result<String>;

    /// Write a file, creating parent directories. Content is newline-normalized.
    async fn write(&self, path: &str, project_root: &Path, content: &str) -> Result<WriteOutcome>;

    /// List project-relative file paths up to `max_depth` directories deep.
    async fn list_files(&self, project_root: &Path, max_depth: usize) -> Result<Vec<String>>;
}

/// Result of a shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl CommandOutput {
    /// All failure text in one string: error, stderr, stdout and details.
    pub fn failure_text(&self) -> String {
        [
            self.error.as_deref(),
            Some(self.stderr.as_str()),
            Some(self.stdout.as_str()),
            self.details.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}

/// Pseudo-command understood by every `ShellExecutor`: terminate whatever
/// process listens on the given port.
pub const KILL_PORT_COMMAND: &str = "kill-port-process";

/// Shell command execution restricted to allow-listed binaries.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn execute(&self, command: &str, project_root: &Path) -> Result<CommandOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Decoded text chunks of a streamed model reply.
pub type ChatStream = BoxStream<'static, Result<String>>;

/// LLM chat completion.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, prompt: &str, history: &[ChatMessage]) -> Result<ChatStream>;
}

/// Display sink mirroring command output. Optional for the engine.
pub trait TerminalSink: Send + Sync {
    fn write(&self, text: &str, is_error: bool);
}

/// Language-aware check-and-fix pass run after a file is written.
#[async_trait]
pub trait ErrorChecker: Send + Sync {
    async fn check_and_fix(&self, path: &str, project_root: &Path) -> Result<()>;
}
