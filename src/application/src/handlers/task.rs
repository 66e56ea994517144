use super::command::run_commands;
use super::install::run_install;
use super::StepContext;
use crate::resolution::commands::install_command_for;
use crate::resolution::{extract_commands, find_task_for_step, match_descriptor, ContentResolver, TargetList};
use domain::entities::StepResult;
use domain::models::{Task, TaskKind};
use shared::types::Result;

/// Run the plan task whose description matches the step.
pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let Some((index, task)) = find_task_for_step(ctx.description, ctx.plan) else {
        ctx.log.error("No task in the plan matches this step");
        return Ok(StepResult::failure("No matching task found"));
    };
    ctx.log.info(format!("Executing tasks[{}] ({:?})", index, task.kind));

    match task.kind {
        TaskKind::Install => install(ctx, task).await,
        TaskKind::Create => write_target(ctx, task, TargetList::Create).await,
        TaskKind::Modify => write_target(ctx, task, TargetList::Modify).await,
        TaskKind::Command => command(ctx, task).await,
    }
}

fn task_text(ctx: &StepContext<'_>, task: &Task) -> String {
    [Some(ctx.description), task.target.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

async fn install(ctx: &StepContext<'_>, task: &Task) -> Result<StepResult> {
    let command = task
        .command
        .clone()
        .filter(|c| !c.trim().is_empty())
        .or_else(|| install_command_for(&task_text(ctx, task), ctx.plan));
    match command {
        Some(command) => run_install(ctx, &command).await,
        None => {
            ctx.log.error("Install task has no command and no packages");
            Ok(StepResult::failure("No packages to install found"))
        }
    }
}

async fn write_target(ctx: &StepContext<'_>, task: &Task, list: TargetList) -> Result<StepResult> {
    let Some(target) = task.target.as_deref().filter(|t| !t.trim().is_empty()) else {
        ctx.log.error("Task has no target file");
        return Ok(StepResult::failure("Task has no target file"));
    };

    let descriptor = match_descriptor(target, ctx.plan, list);
    let Some(resolved) = ContentResolver::standard().resolve(&descriptor, ctx.plan) else {
        return Ok(StepResult::failure(format!("No content available for {}", descriptor.path)));
    };
    ctx.log.info(format!("Content for {} taken from {}", descriptor.path, resolved.source));

    let outcome = ctx.write_file(&descriptor.path, &resolved.content).await;
    if !outcome.success {
        return Ok(StepResult::failure(format!(
            "Failed to write {}: {}",
            descriptor.path, outcome.message
        )));
    }
    ctx.post_write_check(&descriptor.path).await;
    ctx.log.success(format!("Wrote {}", descriptor.path));
    Ok(StepResult::success(format!("✓ {}", descriptor.path)))
}

async fn command(ctx: &StepContext<'_>, task: &Task) -> Result<StepResult> {
    let commands = match task.command.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        Some(command) => vec![command.to_string()],
        None => extract_commands(ctx.description, ctx.plan),
    };
    if commands.is_empty() {
        ctx.log.error("Command task has no command");
        return Ok(StepResult::failure("No executable command found"));
    }
    run_commands(ctx, &commands).await
}
