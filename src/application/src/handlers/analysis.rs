use super::{collect_reply, StepContext};
use domain::entities::StepResult;
use shared::text_processing::truncate_chars;
use shared::types::Result;

/// Files worth showing the model when they exist.
const KEY_CONFIG_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "README.md",
    "requirements.txt",
    "pyproject.toml",
    "Cargo.toml",
    "go.mod",
    "pom.xml",
    "build.gradle",
];

async fn project_tree(ctx: &StepContext<'_>) -> Vec<String> {
    let listing = tokio::time::timeout(
        ctx.config.path_discovery_timeout(),
        ctx.services.fs.list_files(ctx.project_root, ctx.config.tree_max_depth),
    )
    .await;

    match listing {
        Ok(Ok(files)) => files,
        Ok(Err(e)) => {
            ctx.log.warning(format!("Could not list project files: {}", e));
            Vec::new()
        }
        Err(_) => {
            ctx.log.warning(format!(
                "Listing project files took longer than {:?}, continuing without it",
                ctx.config.path_discovery_timeout()
            ));
            Vec::new()
        }
    }
}

fn format_tree(files: &[String], limit: usize) -> String {
    if files.is_empty() {
        return "(unavailable)".to_string();
    }
    let mut tree: Vec<String> = files.iter().take(limit).cloned().collect();
    if files.len() > limit {
        tree.push(format!("... ({} more)", files.len() - limit));
    }
    tree.join("\n")
}

async fn key_files(ctx: &StepContext<'_>, tree: &[String]) -> String {
    let mut sections = Vec::new();
    for name in KEY_CONFIG_FILES {
        if !tree.is_empty() && !tree.iter().any(|f| f == name) {
            continue;
        }
        if let Ok(content) = ctx.services.fs.read(name, ctx.project_root).await {
            sections.push(format!(
                "### {}\n{}",
                name,
                truncate_chars(&content, ctx.config.context_file_char_limit)
            ));
        }
    }
    sections.join("\n\n")
}

pub fn build_analysis_prompt(
    step: &str,
    user_request: &str,
    plan_analysis: &str,
    tree: &str,
    files: &str,
) -> String {
    format!(
        "You are reviewing a software project as one step of an execution plan.\n\n\
         ## Step\n{}\n\n\
         ## Original request\n{}\n\n\
         ## Plan analysis\n{}\n\n\
         ## Project files\n{}\n\n\
         ## Key files\n{}\n\n\
         Answer the step directly and concisely. Do not propose file edits.",
        step,
        if user_request.is_empty() { "(none)" } else { user_request },
        if plan_analysis.is_empty() { "(none)" } else { plan_analysis },
        tree,
        if files.is_empty() { "(none)" } else { files },
    )
}

/// Ask the model about the project and keep the answer as the step's analysis.
pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let files = project_tree(ctx).await;
    let tree = format_tree(&files, ctx.config.tree_entry_limit);
    let key_files = key_files(ctx, &files).await;

    let prompt = build_analysis_prompt(
        ctx.description,
        &ctx.plan.metadata.user_request,
        &ctx.plan.planning.analysis,
        &tree,
        &key_files,
    );
    ctx.log.info(format!("Requesting analysis ({} files in context)", files.len()));

    let reply = match collect_reply(ctx.services.chat.as_ref(), &prompt).await {
        Ok(reply) => reply,
        Err(e) => {
            ctx.log.error(format!("Analysis request failed: {}", e));
            return Ok(StepResult::failure(format!("Analysis request failed: {}", e)));
        }
    };

    let reply = reply.trim();
    if reply.is_empty() {
        ctx.log.error("The model returned an empty analysis");
        return Ok(StepResult::failure("Analysis produced no content"));
    }

    ctx.store.set_analysis(ctx.step_index, reply.to_string());
    ctx.log.success(format!("Analysis complete ({} chars)", reply.chars().count()));
    Ok(StepResult::success(reply.to_string()))
}
