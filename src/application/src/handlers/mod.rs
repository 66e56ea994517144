//! Per-kind step handlers and the helpers they share.
//!
//! Handlers never return an error for an expected failure; they log it and
//! report a failed `StepResult`. An `Err` means a collaborator broke in a way
//! the handler could not account for, and the executor turns it into a
//! failed result.

pub mod analysis;
pub mod command;
pub mod config_file;
pub mod create;
pub mod environment;
pub mod install;
pub mod modify;
pub mod task;

use crate::execution_log::{ExecutionStore, StepLogger};
use crate::plan_executor::Services;
use domain::models::PlanDocument;
use domain::services::{ChatClient, CommandOutput, WriteOutcome};
use futures::StreamExt;
use infrastructure::config::ExecutionConfig;
use shared::text_processing::extension;
use shared::types::Result;
use std::path::Path;

/// Extensions the post-write error checker understands.
pub const SUPPORTED_CHECK_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "py", "go", "rs", "java"];

/// Everything a handler needs for one step execution.
pub struct StepContext<'a> {
    pub step_index: usize,
    pub description: &'a str,
    pub plan: &'a PlanDocument,
    pub project_root: &'a Path,
    pub services: &'a Services,
    pub config: &'a ExecutionConfig,
    pub store: &'a ExecutionStore,
    pub log: StepLogger,
}

impl StepContext<'_> {
    /// Run one command, logging it and mirroring its output to the terminal.
    /// Collaborator errors come back as a failed output.
    pub(crate) async fn run_shell(&self, command: &str) -> CommandOutput {
        self.log.command(command, format!("Running: {}", command));
        if let Some(terminal) = &self.services.terminal {
            terminal.write(&format!("$ {}\n", command), false);
        }

        let output = match self.services.shell.execute(command, self.project_root).await {
            Ok(output) => output,
            Err(e) => CommandOutput {
                success: false,
                error: Some(e.to_string()),
                ..CommandOutput::default()
            },
        };

        if let Some(terminal) = &self.services.terminal {
            if !output.stdout.is_empty() {
                terminal.write(&output.stdout, false);
            }
            if !output.stderr.is_empty() {
                terminal.write(&output.stderr, true);
            }
            if let Some(error) = &output.error {
                terminal.write(&format!("{}\n", error), true);
            }
        }
        output
    }

    /// Write a file and log the outcome. Collaborator errors come back as a
    /// failed outcome so sibling writes can continue.
    pub(crate) async fn write_file(&self, path: &str, content: &str) -> WriteOutcome {
        let outcome = match self.services.fs.write(path, self.project_root, content).await {
            Ok(outcome) => outcome,
            Err(e) => WriteOutcome {
                success: false,
                message: e.to_string(),
            },
        };

        if outcome.success {
            self.log.file(path, outcome.message.clone());
        } else {
            self.log.file_error(path, format!("Failed to write {}: {}", path, outcome.message));
        }
        outcome
    }

    /// Run the optional error checker on a freshly written file.
    pub(crate) async fn post_write_check(&self, path: &str) {
        let Some(checker) = &self.services.error_checker else {
            return;
        };
        let supported = extension(path)
            .map(|ext| SUPPORTED_CHECK_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if !supported {
            return;
        }

        if let Err(e) = checker.check_and_fix(path, self.project_root).await {
            self.log.warning(format!("Error check for {} failed: {}", path, e));
        }
    }
}

/// Drain a streamed model reply into one string.
pub(crate) async fn collect_reply(chat: &dyn ChatClient, prompt: &str) -> Result<String> {
    let mut stream = chat.complete(prompt, &[]).await?;
    let mut reply = String::new();
    while let Some(chunk) = stream.next().await {
        reply.push_str(&chunk?);
    }
    Ok(reply)
}

/// First non-empty line, for compact result messages.
pub(crate) fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}
