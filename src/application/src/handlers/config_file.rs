use super::StepContext;
use crate::resolution::content::template_for;
use crate::resolution::targets::path_tokens;
use crate::resolution::{match_descriptor, ContentResolver, TargetList};
use domain::entities::StepResult;
use shared::text_processing::{basename, extension};
use shared::types::Result;

/// Keyword to conventional file name, checked in order.
const WELL_KNOWN_CONFIGS: &[(&str, &str)] = &[
    ("tsconfig", "tsconfig.json"),
    ("jsconfig", "jsconfig.json"),
    ("eslint", ".eslintrc.json"),
    ("prettier", ".prettierrc"),
    ("babel", ".babelrc"),
    ("vitest", "vitest.config.ts"),
    ("vite", "vite.config.ts"),
    ("next", "next.config.js"),
    ("tailwind", "tailwind.config.js"),
    ("postcss", "postcss.config.js"),
    ("jest", "jest.config.js"),
    ("webpack", "webpack.config.js"),
    ("editorconfig", ".editorconfig"),
    ("docker-compose", "docker-compose.yml"),
];

/// Dotfiles whose content is JSON despite having no extension.
const JSON_DOTFILES: &[&str] = &[".eslintrc", ".prettierrc", ".babelrc"];

/// Config file named by the step: an explicit file token first, then a
/// well-known tool name.
pub fn config_file_name(text: &str) -> Option<String> {
    if let Some(token) = path_tokens(text).into_iter().next() {
        return Some(token);
    }

    let lowered = text.to_lowercase();
    WELL_KNOWN_CONFIGS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, file)| file.to_string())
}

/// Minimal content for a config file nobody supplied content for.
pub fn config_skeleton(path: &str) -> String {
    let name = basename(path);
    match extension(path).as_deref() {
        Some("json") => "{}\n".to_string(),
        Some("mjs") | Some("ts") | Some("mts") => "export default {};\n".to_string(),
        Some("js") | Some("cjs") => "module.exports = {};\n".to_string(),
        _ if JSON_DOTFILES.contains(&name) => "{}\n".to_string(),
        _ => template_for(path, Some("Configuration")),
    }
}

pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let Some(name) = config_file_name(ctx.description) else {
        ctx.log.error("No configuration file name found in step");
        return Ok(StepResult::failure("No configuration file found in step"));
    };

    let descriptor = match_descriptor(&name, ctx.plan, TargetList::Create);
    let path = descriptor.path.clone();

    let content = match ContentResolver::without_template().resolve(&descriptor, ctx.plan) {
        Some(resolved) => {
            ctx.log.info(format!("Content for {} taken from {}", path, resolved.source));
            resolved.content
        }
        None => {
            if ctx.services.fs.read(&path, ctx.project_root).await.is_ok() {
                ctx.log.warning(format!("{} already exists and the plan has no content for it", path));
                return Ok(StepResult::success(format!("{} already exists, left unchanged", path)));
            }
            ctx.log.warning(format!("No content for {} in the plan, writing a skeleton", path));
            config_skeleton(&path)
        }
    };

    let outcome = ctx.write_file(&path, &content).await;
    if !outcome.success {
        return Ok(StepResult::failure(format!(
            "Failed to write {}: {}",
            path, outcome.message
        )));
    }
    ctx.log.success(format!("Wrote configuration file {}", path));
    Ok(StepResult::success(format!("✓ {}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_name() {
        assert_eq!(config_file_name("Configure tsconfig.json paths").as_deref(), Some("tsconfig.json"));
        assert_eq!(config_file_name("ESLint 설정 파일 추가").as_deref(), Some(".eslintrc.json"));
        assert_eq!(config_file_name("Vitest config").as_deref(), Some("vitest.config.ts"));
        assert_eq!(config_file_name("설정 파일"), None);
    }

    #[test]
    fn test_config_skeleton() {
        assert_eq!(config_skeleton("tsconfig.json"), "{}\n");
        assert_eq!(config_skeleton(".prettierrc"), "{}\n");
        assert_eq!(config_skeleton("vite.config.ts"), "export default {};\n");
        assert_eq!(config_skeleton("jest.config.js"), "module.exports = {};\n");
        assert_eq!(config_skeleton("docker-compose.yml"), "# Configuration\n");
    }
}
