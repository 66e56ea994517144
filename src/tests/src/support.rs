//! Recording in-memory collaborators for driving the engine in tests.

use application::{ExecutionStore, PlanExecutor, Services};
use async_trait::async_trait;
use domain::services::{
    ChatClient, ChatMessage, ChatStream, CommandOutput, ErrorChecker, FileSystem, ShellExecutor,
    TerminalSink, WriteOutcome,
};
use futures::stream::{self, StreamExt};
use infrastructure::config::ExecutionConfig;
use shared::error::{Error, Result};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<String, String>>,
    writes: Mutex<Vec<(String, String)>>,
    reads: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    stalled_listing: bool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files.lock().unwrap().insert(path.to_string(), content.to_string());
        self
    }

    /// Writes to this path report failure.
    pub fn failing_on(self, path: &str) -> Self {
        self.failing.lock().unwrap().insert(path.to_string());
        self
    }

    /// `list_files` never completes.
    pub fn with_stalled_listing(mut self) -> Self {
        self.stalled_listing = true;
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn written_paths(&self) -> Vec<String> {
        self.writes().into_iter().map(|(path, _)| path).collect()
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileSystem for MemoryFileSystem {
    async fn read(&self, path: &str, _project_root: &Path) -> Result<String> {
        self.reads.lock().unwrap().push(path.to_string());
        self.file(path).ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, _project_root: &Path, content: &str) -> Result<WriteOutcome> {
        self.writes.lock().unwrap().push((path.to_string(), content.to_string()));
        if self.failing.lock().unwrap().contains(path) {
            return Ok(WriteOutcome {
                success: false,
                message: "disk full".to_string(),
            });
        }
        self.files.lock().unwrap().insert(path.to_string(), content.to_string());
        Ok(WriteOutcome {
            success: true,
            message: format!("Wrote {}", path),
        })
    }

    async fn list_files(&self, _project_root: &Path, _max_depth: usize) -> Result<Vec<String>> {
        if self.stalled_listing {
            futures::future::pending::<()>().await;
        }
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }
}

pub fn ok_output(stdout: &str) -> CommandOutput {
    CommandOutput {
        success: true,
        stdout: stdout.to_string(),
        ..CommandOutput::default()
    }
}

pub fn failed_output(stderr: &str) -> CommandOutput {
    CommandOutput {
        success: false,
        stderr: stderr.to_string(),
        error: Some("Command failed with exit code 1".to_string()),
        ..CommandOutput::default()
    }
}

/// Shell that replays queued outputs per command and succeeds otherwise.
#[derive(Default)]
pub struct ScriptedShell {
    scripts: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outputs returned for successive runs of `command`.
    pub fn script(self, command: &str, outputs: Vec<CommandOutput>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .extend(outputs);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }
}

#[async_trait]
impl ShellExecutor for ScriptedShell {
    async fn execute(&self, command: &str, _project_root: &Path) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.to_string());
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(command)
            .and_then(|queue| queue.pop_front());
        Ok(next.unwrap_or_else(|| ok_output("")))
    }
}

/// Chat client replaying canned replies, streamed in two chunks.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(reply.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for ScriptedChat {
    async fn complete(&self, prompt: &str, _history: &[ChatMessage]) -> Result<ChatStream> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or_default();

        let split = reply
            .char_indices()
            .nth(reply.chars().count() / 2)
            .map(|(i, _)| i)
            .unwrap_or(reply.len());
        let chunks: Vec<Result<String>> = vec![Ok(reply[..split].to_string()), Ok(reply[split..].to_string())];
        Ok(stream::iter(chunks).boxed())
    }
}

#[derive(Default)]
pub struct RecordingTerminal {
    lines: Mutex<Vec<(String, bool)>>,
}

impl RecordingTerminal {
    pub fn lines(&self) -> Vec<(String, bool)> {
        self.lines.lock().unwrap().clone()
    }
}

impl TerminalSink for RecordingTerminal {
    fn write(&self, text: &str, is_error: bool) {
        self.lines.lock().unwrap().push((text.to_string(), is_error));
    }
}

#[derive(Default)]
pub struct RecordingChecker {
    checked: Mutex<Vec<String>>,
}

impl RecordingChecker {
    pub fn checked(&self) -> Vec<String> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl ErrorChecker for RecordingChecker {
    async fn check_and_fix(&self, path: &str, _project_root: &Path) -> Result<()> {
        self.checked.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

/// Executor over the given fakes with every delay set to zero.
pub fn executor(
    fs: Arc<MemoryFileSystem>,
    shell: Arc<ScriptedShell>,
    chat: Arc<ScriptedChat>,
) -> PlanExecutor {
    PlanExecutor::new(
        Services::new(fs, shell, chat),
        ExecutionConfig::without_delays(),
        Arc::new(ExecutionStore::new()),
    )
}

pub fn executor_with(services: Services) -> PlanExecutor {
    PlanExecutor::new(
        services,
        ExecutionConfig::without_delays(),
        Arc::new(ExecutionStore::new()),
    )
}
