use super::StepContext;
use crate::resolution::{resolve_descriptors, ContentResolver, TargetList};
use domain::entities::StepResult;
use shared::types::Result;

/// Replace the one file the step names. Never writes a template.
pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let targets = resolve_descriptors(ctx.description, ctx.plan, ctx.step_index, TargetList::Modify);
    let Some(target) = targets.first() else {
        ctx.log.error("No target file could be resolved for this step");
        return Ok(StepResult::failure("No file to modify found in step"));
    };
    if targets.len() > 1 {
        ctx.log.warning(format!(
            "Step names {} files, modifying only {}",
            targets.len(),
            target.path
        ));
    }

    let resolved = ContentResolver::without_template()
        .resolve(target, ctx.plan)
        .filter(|r| r.content.trim().chars().count() >= ctx.config.min_modify_content_len);
    let Some(resolved) = resolved else {
        ctx.log.file_error(&target.path, format!("No modification content found for {}", target.path));
        return Ok(StepResult::failure(format!(
            "No modification content found for {}",
            target.path
        )));
    };

    ctx.log.info(format!("Content for {} taken from {}", target.path, resolved.source));
    let outcome = ctx.write_file(&target.path, &resolved.content).await;
    if !outcome.success {
        return Ok(StepResult::failure(format!(
            "Failed to modify {}: {}",
            target.path, outcome.message
        )));
    }

    ctx.post_write_check(&target.path).await;
    ctx.log.success(format!("Modified {}", target.path));
    Ok(StepResult::success(format!("Modified {}", target.path)))
}
