use super::StepContext;
use crate::resolution::{resolve_descriptors, ContentResolver, ContentSource, TargetList};
use domain::entities::StepResult;
use shared::types::Result;

/// Write every file the step names, one after another.
pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let targets = resolve_descriptors(ctx.description, ctx.plan, ctx.step_index, TargetList::Create);
    if targets.is_empty() {
        ctx.log.error("No target file could be resolved for this step");
        return Ok(StepResult::failure("No file to create found in step"));
    }

    ctx.log.info(format!(
        "Creating {} file(s): {}",
        targets.len(),
        targets.iter().map(|t| t.path.as_str()).collect::<Vec<_>>().join(", ")
    ));

    let resolver = ContentResolver::standard();
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut lines = Vec::with_capacity(targets.len());

    for (i, target) in targets.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(ctx.config.file_write_delay()).await;
        }

        let Some(resolved) = resolver.resolve(target, ctx.plan) else {
            failed += 1;
            ctx.log.file_error(&target.path, format!("No content available for {}", target.path));
            lines.push(format!("✗ {}: no content", target.path));
            continue;
        };

        if resolved.source == ContentSource::Template {
            ctx.log.warning(format!(
                "No content for {} in the plan, writing a template",
                target.path
            ));
        } else {
            ctx.log.info(format!("Content for {} taken from {}", target.path, resolved.source));
        }

        let outcome = ctx.write_file(&target.path, &resolved.content).await;
        if outcome.success {
            succeeded += 1;
            lines.push(format!("✓ {}", target.path));
            ctx.post_write_check(&target.path).await;
        } else {
            failed += 1;
            lines.push(format!("✗ {}: {}", target.path, outcome.message));
        }
    }

    let message = format!(
        "Created {}/{} file(s)\n{}",
        succeeded,
        targets.len(),
        lines.join("\n")
    );
    if failed == 0 {
        ctx.log.success(format!("Created {} file(s)", succeeded));
        Ok(StepResult::success(message))
    } else {
        ctx.log.error(format!("{} of {} file(s) failed", failed, targets.len()));
        Ok(StepResult::failure(message))
    }
}
