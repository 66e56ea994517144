//! Per-step execution records: status, append-only log, last result and
//! analysis artifacts, keyed by step index.
//!
//! The store is created by the caller and injected into the executor, so its
//! lifetime is the caller's session rather than the process.

use domain::entities::{ExecutionLogEntry, LogKind, StepResult, StepStatus};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub status: StepStatus,
    pub logs: Vec<ExecutionLogEntry>,
    pub result: Option<StepResult>,
    pub executions: u32,
    pub analysis: Option<String>,
}

#[derive(Debug, Default)]
pub struct ExecutionStore {
    records: Mutex<HashMap<usize, StepRecord>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<usize, StepRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Mark a step as executing and return its execution count (1 on first run).
    pub fn begin(&self, step_index: usize) -> u32 {
        let mut records = self.records();
        let record = records.entry(step_index).or_default();
        record.status = StepStatus::Executing;
        record.executions += 1;
        record.executions
    }

    pub fn finish(&self, step_index: usize, result: &StepResult) {
        let mut records = self.records();
        let record = records.entry(step_index).or_default();
        record.status = if result.success {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed
        };
        record.result = Some(result.clone());
    }

    pub fn append(&self, step_index: usize, entry: ExecutionLogEntry) {
        self.records()
            .entry(step_index)
            .or_default()
            .logs
            .push(entry);
    }

    pub fn status(&self, step_index: usize) -> StepStatus {
        self.records()
            .get(&step_index)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn logs(&self, step_index: usize) -> Vec<ExecutionLogEntry> {
        self.records()
            .get(&step_index)
            .map(|r| r.logs.clone())
            .unwrap_or_default()
    }

    pub fn result(&self, step_index: usize) -> Option<StepResult> {
        self.records().get(&step_index).and_then(|r| r.result.clone())
    }

    pub fn record(&self, step_index: usize) -> Option<StepRecord> {
        self.records().get(&step_index).cloned()
    }

    pub fn set_analysis(&self, step_index: usize, analysis: String) {
        self.records().entry(step_index).or_default().analysis = Some(analysis);
    }

    pub fn analysis(&self, step_index: usize) -> Option<String> {
        self.records()
            .get(&step_index)
            .and_then(|r| r.analysis.clone())
    }

    pub fn logger(self: &Arc<Self>, step_index: usize) -> StepLogger {
        StepLogger {
            store: Arc::clone(self),
            step_index,
        }
    }
}

/// Append handle for one step's log. Every entry is mirrored to `tracing`.
#[derive(Debug, Clone)]
pub struct StepLogger {
    store: Arc<ExecutionStore>,
    step_index: usize,
}

impl StepLogger {
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn log(&self, entry: ExecutionLogEntry) {
        let step = self.step_index;
        match entry.kind {
            LogKind::Error => tracing::error!(step, "{}", entry.message),
            LogKind::Warning => tracing::warn!(step, "{}", entry.message),
            LogKind::Command => {
                tracing::info!(step, command = entry.command.as_deref().unwrap_or(""), "{}", entry.message)
            }
            _ => tracing::info!(step, "{}", entry.message),
        }
        self.store.append(step, entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::Info, message));
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::Success, message));
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::Warning, message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::Error, message));
    }

    pub fn command(&self, command: &str, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::Command, message).with_command(command));
    }

    pub fn file(&self, path: &str, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::File, message).with_file(path));
    }

    pub fn file_error(&self, path: &str, message: impl Into<String>) {
        self.log(ExecutionLogEntry::new(LogKind::Error, message).with_file(path));
    }

    pub fn command_error(&self, command: &str, message: impl Into<String>, details: &str) {
        let mut entry = ExecutionLogEntry::new(LogKind::Error, message).with_command(command);
        if !details.trim().is_empty() {
            entry = entry.with_details(details);
        }
        self.log(entry);
    }
}
