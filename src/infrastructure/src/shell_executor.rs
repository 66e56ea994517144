use crate::config::ShellConfig;
use crate::process_registry::ProcessRegistry;
use async_trait::async_trait;
use domain::services::{CommandOutput, ShellExecutor, KILL_PORT_COMMAND};
use once_cell::sync::Lazy;
use regex::Regex;
use shared::error::{Error, Result};
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Commands that start a server and are expected to keep running.
static SERVER_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(npm|yarn|pnpm|bun)\s+(run\s+)?(dev|start|serve|preview)\b|\bnext\s+(dev|start)\b|\bvite\b|\buvicorn\b|\bflask\s+run\b|\bmanage\.py\s+runserver\b|\bgo\s+run\b|\bcargo\s+run\b|\bspring-boot:run\b|\bbootRun\b|\bdotnet\s+(run|watch)\b|\brails\s+(s|server)\b",
    )
    .expect("server command pattern is valid")
});

/// Shell collaborator running allow-listed commands inside the project root.
pub struct LocalShellExecutor {
    allowed_binaries: HashSet<String>,
    registry: Arc<ProcessRegistry>,
    dev_server_grace: Duration,
    max_output_bytes: usize,
}

impl LocalShellExecutor {
    pub fn new(config: &ShellConfig, registry: Arc<ProcessRegistry>) -> Self {
        Self {
            allowed_binaries: config.allowed_binaries.iter().cloned().collect(),
            registry,
            dev_server_grace: Duration::from_millis(config.dev_server_grace_ms),
            max_output_bytes: config.max_output_bytes,
        }
    }

    /// True when the command starts a long-running server.
    pub fn is_server_command(command: &str) -> bool {
        SERVER_COMMAND.is_match(command)
    }

    /// Base binary of one command segment, skipping `VAR=value` prefixes.
    pub fn base_binary(segment: &str) -> Option<&str> {
        segment
            .split_whitespace()
            .find(|token| !(token.contains('=') && !token.starts_with('=')))
    }

    /// Every segment joined by `&&`, `||`, `;`, `|` or a line break must start
    /// with an allowed binary. Command substitution is never allowed.
    pub fn is_allowed(&self, command: &str) -> bool {
        if command.contains("$(") || command.contains('`') {
            return false;
        }

        let segments: Vec<&str> = command
            .split(['&', '|', ';', '\n', '\r'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return false;
        }

        segments.iter().all(|segment| match Self::base_binary(segment) {
            Some("cd") => true,
            Some(binary) => {
                self.allowed_binaries.contains(binary)
                    || binary
                        .rsplit('/')
                        .next()
                        .is_some_and(|name| self.allowed_binaries.contains(name))
            }
            None => false,
        })
    }

    fn shell_command(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.arg("/C").arg(command);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(command);
            cmd
        }
    }

    fn spawn_reader<R>(mut reader: R, buffer: Arc<Mutex<Vec<u8>>>, limit: usize) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let mut chunk = [0u8; 4096];
            loop {
                match reader.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let mut buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
                        let remaining = limit.saturating_sub(buf.len());
                        buf.extend_from_slice(&chunk[..n.min(remaining)]);
                    }
                }
            }
        })
    }

    fn snapshot(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
        let buf = buffer.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).to_string()
    }

    async fn run(&self, command: &str, project_root: &Path) -> Result<CommandOutput> {
        let mut cmd = Self::shell_command(command);
        cmd.current_dir(project_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            Error::CommandExecution(format!("Failed to spawn '{}': {}", command, e))
        })?;

        let stdout_buf = Arc::new(Mutex::new(Vec::new()));
        let stderr_buf = Arc::new(Mutex::new(Vec::new()));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(Self::spawn_reader(stdout, stdout_buf.clone(), self.max_output_bytes));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(Self::spawn_reader(stderr, stderr_buf.clone(), self.max_output_bytes));
        }

        let waited = if Self::is_server_command(command) {
            tokio::select! {
                status = child.wait() => status,
                _ = tokio::time::sleep(self.dev_server_grace) => {
                    let stdout = Self::snapshot(&stdout_buf);
                    let stderr = Self::snapshot(&stderr_buf);
                    let pid = self.registry.register(command, project_root, child);
                    tracing::info!("'{}' keeps running in the background (pid {:?})", command, pid);
                    return Ok(CommandOutput {
                        success: true,
                        stdout,
                        stderr,
                        error: None,
                        details: Some(match pid {
                            Some(pid) => format!("running in background (pid {})", pid),
                            None => "running in background".to_string(),
                        }),
                    });
                }
            }
        } else {
            child.wait().await
        };
        let status = waited.map_err(|e| {
            Error::CommandExecution(format!("Failed to wait for '{}': {}", command, e))
        })?;

        // Grandchildren may hold the pipes open after the shell exits.
        for reader in readers {
            let _ = tokio::time::timeout(Duration::from_secs(1), reader).await;
        }

        let stdout = Self::snapshot(&stdout_buf);
        let stderr = Self::snapshot(&stderr_buf);
        let success = status.success();
        Ok(CommandOutput {
            success,
            stdout,
            stderr,
            error: (!success).then(|| match status.code() {
                Some(code) => format!("Command failed with exit code {}", code),
                None => "Command terminated by signal".to_string(),
            }),
            details: None,
        })
    }

    async fn kill_port(&self, port: u16, project_root: &Path) -> Result<CommandOutput> {
        let lookup = if cfg!(windows) {
            format!("netstat -ano | findstr :{}", port)
        } else {
            format!("lsof -ti tcp:{}", port)
        };

        let output = Self::shell_command(&lookup)
            .current_dir(project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::CommandExecution(format!("Port lookup failed: {}", e)))?;
        let listing = String::from_utf8_lossy(&output.stdout).to_string();

        let pids: Vec<String> = if cfg!(windows) {
            listing
                .lines()
                .filter(|line| line.contains("LISTENING"))
                .filter_map(|line| line.split_whitespace().last())
                .map(str::to_string)
                .collect()
        } else {
            listing
                .split_whitespace()
                .filter(|pid| pid.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string)
                .collect()
        };

        let mut unique: Vec<String> = Vec::new();
        for pid in pids {
            if !unique.contains(&pid) {
                unique.push(pid);
            }
        }

        if unique.is_empty() {
            return Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: format!("No process is listening on port {}", port),
                error: Some("no process found".to_string()),
                details: None,
            });
        }

        let kill = if cfg!(windows) {
            unique
                .iter()
                .map(|pid| format!("taskkill /F /PID {}", pid))
                .collect::<Vec<_>>()
                .join(" & ")
        } else {
            format!("kill -9 {}", unique.join(" "))
        };

        let output = Self::shell_command(&kill)
            .current_dir(project_root)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::CommandExecution(format!("Kill failed: {}", e)))?;
        self.registry.reap();

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: format!("Killed process(es) {} on port {}", unique.join(", "), port),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            error: None,
            details: None,
        })
    }
}

#[async_trait]
impl ShellExecutor for LocalShellExecutor {
    async fn execute(&self, command: &str, project_root: &Path) -> Result<CommandOutput> {
        let command = command.trim();

        if let Some(rest) = command.strip_prefix(KILL_PORT_COMMAND) {
            let port: u16 = rest.trim().parse().map_err(|_| {
                Error::InvalidInput(format!("invalid port in '{}'", command))
            })?;
            return self.kill_port(port, project_root).await;
        }

        if !self.is_allowed(command) {
            tracing::warn!("Rejected command outside the allow-list: {}", command);
            return Ok(CommandOutput {
                success: false,
                stdout: String::new(),
                stderr: String::new(),
                error: Some(format!("Command not allowed: {}", command)),
                details: None,
            });
        }

        tracing::debug!("Executing '{}' in {}", command, project_root.display());
        self.run(command, project_root).await
    }
}
