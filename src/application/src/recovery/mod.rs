//! Automatic recovery for two known command failures: a port that is
//! already taken and web-toolchain compile errors.
//!
//! Recovery runs at most `MAX_RECOVERY_RETRIES` times per failing command
//! within one step and always ends with a single retry of that command.

pub mod build_error;
pub mod port_conflict;

use crate::handlers::StepContext;
use domain::services::CommandOutput;
use shared::text_processing::strip_ansi;
use std::collections::HashMap;

pub const MAX_RECOVERY_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The retry after recovery succeeded.
    Recovered,
    /// Recovery ran but the retry failed again.
    StillFailing,
    /// No recovery recipe matched the failure.
    NotApplicable,
}

/// Per-step recovery state: how often each command has been recovered.
#[derive(Debug, Default)]
pub struct RecoveryController {
    attempts: HashMap<String, u32>,
}

impl RecoveryController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self, command: &str) -> u32 {
        self.attempts.get(command).copied().unwrap_or(0)
    }

    pub async fn recover(
        &mut self,
        ctx: &StepContext<'_>,
        command: &str,
        output: &CommandOutput,
    ) -> RecoveryOutcome {
        if self.attempts(command) >= MAX_RECOVERY_RETRIES {
            ctx.log.warning(format!("Recovery already attempted for {}", command));
            return RecoveryOutcome::NotApplicable;
        }

        let failure = strip_ansi(&output.failure_text());

        if port_conflict::is_port_conflict(command, &failure) {
            let Some(port) = port_conflict::extract_port(&failure) else {
                ctx.log.warning("Port conflict detected but no port number found");
                return RecoveryOutcome::NotApplicable;
            };
            *self.attempts.entry(command.to_string()).or_insert(0) += 1;
            return port_conflict::recover(ctx, command, port).await;
        }

        if build_error::is_build_failure(command, &failure) {
            let files = build_error::parse_diagnostics(&failure);
            if files.is_empty() {
                ctx.log.warning("Build failed but no file locations were found in the output");
                return RecoveryOutcome::NotApplicable;
            }
            *self.attempts.entry(command.to_string()).or_insert(0) += 1;
            return build_error::recover(ctx, command, &files).await;
        }

        RecoveryOutcome::NotApplicable
    }
}
