use super::{first_line, StepContext};
use crate::recovery::{RecoveryController, RecoveryOutcome};
use crate::resolution::extract_commands;
use domain::entities::StepResult;
use shared::types::Result;

pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let commands = extract_commands(ctx.description, ctx.plan);
    if commands.is_empty() {
        ctx.log.error("No executable command found in step");
        return Ok(StepResult::failure("No executable command found"));
    }

    ctx.log.info(format!("Commands: {}", commands.join(", ")));
    run_commands(ctx, &commands).await
}

/// Run commands in order, handing each failure to the recovery controller.
/// A recovered command no longer counts as failed.
pub(crate) async fn run_commands(ctx: &StepContext<'_>, commands: &[String]) -> Result<StepResult> {
    let mut recovery = RecoveryController::new();
    let mut failures = 0usize;
    let mut lines = Vec::with_capacity(commands.len());

    for (i, command) in commands.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(ctx.config.command_delay()).await;
        }

        let output = ctx.run_shell(command).await;
        if output.success {
            ctx.log.success(format!("Command succeeded: {}", command));
            lines.push(format!("✓ {}", command));
            continue;
        }

        failures += 1;
        let failure_text = output.failure_text();
        ctx.log
            .command_error(command, format!("Command failed: {}", command), &failure_text);

        match recovery.recover(ctx, command, &output).await {
            RecoveryOutcome::Recovered => {
                failures -= 1;
                lines.push(format!("✓ {} (recovered)", command));
            }
            RecoveryOutcome::StillFailing => {
                lines.push(format!("✗ {} (recovery failed)", command));
            }
            RecoveryOutcome::NotApplicable => {
                lines.push(format!("✗ {}: {}", command, first_line(&failure_text)));
            }
        }
    }

    let message = lines.join("\n");
    if failures == 0 {
        Ok(StepResult::success(message))
    } else {
        ctx.log.error(format!("{} of {} command(s) failed", failures, commands.len()));
        Ok(StepResult::failure(message))
    }
}
