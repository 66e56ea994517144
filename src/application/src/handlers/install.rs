use super::{first_line, StepContext};
use crate::resolution::commands::{install_command_for, install_task_command};
use domain::entities::StepResult;
use shared::types::Result;

pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let command = install_command_for(ctx.description, ctx.plan)
        .or_else(|| install_task_command(ctx.description, ctx.plan));
    let Some(command) = command else {
        ctx.log.error("No packages to install found in step or plan");
        return Ok(StepResult::failure("No packages to install found"));
    };

    run_install(ctx, &command).await
}

/// Install commands are not handed to recovery.
pub(crate) async fn run_install(ctx: &StepContext<'_>, command: &str) -> Result<StepResult> {
    let output = ctx.run_shell(command).await;
    if output.success {
        ctx.log.success(format!("Installed packages: {}", command));
        return Ok(StepResult::success(format!("✓ {}", command)));
    }

    let failure_text = output.failure_text();
    ctx.log
        .command_error(command, format!("Install failed: {}", command), &failure_text);
    Ok(StepResult::failure(format!(
        "✗ {}: {}",
        command,
        first_line(&failure_text)
    )))
}
