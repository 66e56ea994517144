use colored::Colorize;
use domain::services::TerminalSink;
use std::io::Write;

/// Mirrors command output to the process's stdout/stderr.
#[derive(Debug, Clone, Default)]
pub struct ConsoleTerminal {
    prefix: Option<String>,
}

impl ConsoleTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    fn format_line(&self, line: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{} {}", prefix.dimmed(), line),
            None => line.to_string(),
        }
    }
}

impl TerminalSink for ConsoleTerminal {
    fn write(&self, text: &str, is_error: bool) {
        if text.trim().is_empty() {
            return;
        }
        if is_error {
            let mut stderr = std::io::stderr().lock();
            for line in text.lines() {
                let _ = writeln!(stderr, "{}", self.format_line(&line.red().to_string()));
            }
        } else {
            let mut stdout = std::io::stdout().lock();
            for line in text.lines() {
                let _ = writeln!(stdout, "{}", self.format_line(line));
            }
        }
    }
}
