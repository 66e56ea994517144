use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::process::Child;

/// Long-running processes (dev servers) started by the shell executor.
///
/// Owned by whoever builds the executor and dropped with it; there is no
/// process-wide registry.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    processes: Mutex<HashMap<u32, BackgroundProcess>>,
}

#[derive(Debug)]
struct BackgroundProcess {
    command: String,
    project_root: PathBuf,
    started_at: Instant,
    child: Child,
}

/// Snapshot of a registered process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub command: String,
    pub project_root: PathBuf,
    pub uptime: Duration,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a running child. Returns its pid, or `None` if it already exited.
    pub fn register(&self, command: &str, project_root: &Path, child: Child) -> Option<u32> {
        let pid = child.id()?;
        let mut processes = self.processes.lock().unwrap_or_else(|e| e.into_inner());
        processes.insert(
            pid,
            BackgroundProcess {
                command: command.to_string(),
                project_root: project_root.to_path_buf(),
                started_at: Instant::now(),
                child,
            },
        );
        Some(pid)
    }

    pub fn list(&self) -> Vec<ProcessInfo> {
        let processes = self.processes.lock().unwrap_or_else(|e| e.into_inner());
        let mut infos: Vec<_> = processes
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: *pid,
                command: process.command.clone(),
                project_root: process.project_root.clone(),
                uptime: process.started_at.elapsed(),
            })
            .collect();
        infos.sort_by_key(|info| info.pid);
        infos
    }

    /// Forget processes that have exited on their own.
    pub fn reap(&self) -> usize {
        let mut processes = self.processes.lock().unwrap_or_else(|e| e.into_inner());
        let before = processes.len();
        processes.retain(|_, process| matches!(process.child.try_wait(), Ok(None)));
        before - processes.len()
    }

    /// Kill every tracked process. Returns how many kill signals were sent.
    pub fn stop_all(&self) -> usize {
        let mut processes = self.processes.lock().unwrap_or_else(|e| e.into_inner());
        let mut stopped = 0;
        for (pid, mut process) in processes.drain() {
            match process.child.start_kill() {
                Ok(()) => stopped += 1,
                Err(e) => tracing::warn!("Failed to stop process {}: {}", pid, e),
            }
        }
        stopped
    }
}
