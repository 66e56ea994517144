use super::RecoveryOutcome;
use crate::handlers::{collect_reply, StepContext};
use once_cell::sync::Lazy;
use regex::Regex;

static BUILD_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:build|compile|test|tsc|type-?check)\b").expect("build command pattern is valid")
});

static COMPILER_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Failed to compile|Type error|error TS\d+|Module not found|SyntaxError|Build error occurred")
        .expect("compiler marker pattern is valid")
});

static LOCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\./([\w@\[\]()./\-]+\.[A-Za-z]+):(\d+):(\d+)").expect("location pattern is valid")
});

static FENCED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[\w+\-]*[ \t]*\r?\n(.*?)```").expect("fenced block pattern is valid")
});

/// Reply fields that may carry the corrected file.
const CONTENT_FIELDS: &[&str] = &["content", "fixedCode", "fixed_code", "code"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDiagnostic {
    pub line: u32,
    pub column: u32,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiagnostics {
    pub path: String,
    pub diagnostics: Vec<BuildDiagnostic>,
}

/// A build, compile or test command whose output carries a compiler marker.
pub fn is_build_failure(command: &str, failure: &str) -> bool {
    BUILD_COMMAND.is_match(command) && COMPILER_MARKER.is_match(failure)
}

fn location_message(rest: &str, following: Option<&str>) -> String {
    let inline = rest.trim_start_matches([':', '-', ' ', '\t']).trim();
    if !inline.is_empty() {
        return inline.to_string();
    }
    following.map(str::trim).unwrap_or("").to_string()
}

/// `./path:line:col` occurrences grouped by file, in first-seen order.
pub fn parse_diagnostics(output: &str) -> Vec<FileDiagnostics> {
    let lines: Vec<&str> = output.lines().collect();
    let mut files: Vec<FileDiagnostics> = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let following = lines[i + 1..].iter().copied().find(|l| !l.trim().is_empty());
        for caps in LOCATION.captures_iter(line) {
            let (Some(whole), Some(path), Some(row), Some(col)) = (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
            else {
                continue;
            };
            let diagnostic = BuildDiagnostic {
                line: row.as_str().parse().unwrap_or(0),
                column: col.as_str().parse().unwrap_or(0),
                message: location_message(&line[whole.end()..], following),
            };

            match files.iter_mut().find(|f| f.path == path.as_str()) {
                Some(file) => {
                    if !file.diagnostics.contains(&diagnostic) {
                        file.diagnostics.push(diagnostic);
                    }
                }
                None => files.push(FileDiagnostics {
                    path: path.as_str().to_string(),
                    diagnostics: vec![diagnostic],
                }),
            }
        }
    }
    files
}

pub fn build_fix_prompt(file: &FileDiagnostics, content: &str) -> String {
    let errors = file
        .diagnostics
        .iter()
        .map(|d| format!("- line {}, column {}: {}", d.line, d.column, d.message))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "The build failed with errors in {path}.\n\n\
         Errors:\n{errors}\n\n\
         Current content of {path}:\n```\n{content}\n```\n\n\
         Fix the errors without changing unrelated code. Respond with JSON \
         {{\"content\": \"<the complete corrected file>\"}} or with the complete \
         corrected file in a single fenced code block.",
        path = file.path,
        errors = errors,
        content = content,
    )
}

/// Replacement file content from a model reply: a JSON field first, then
/// the first fenced code block.
pub fn extract_fixed_content(reply: &str) -> Option<String> {
    if let (Some(start), Some(end)) = (reply.find('{'), reply.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&reply[start..=end]) {
                let field = CONTENT_FIELDS
                    .iter()
                    .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
                    .filter(|content| !content.trim().is_empty());
                if let Some(content) = field {
                    return Some(content.to_string());
                }
            }
        }
    }

    FENCED_BLOCK
        .captures(reply)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|content| !content.trim().is_empty())
}

async fn fix_file(ctx: &StepContext<'_>, file: &FileDiagnostics) -> bool {
    let original = match ctx.services.fs.read(&file.path, ctx.project_root).await {
        Ok(content) => content,
        Err(e) => {
            ctx.log.file_error(&file.path, format!("Cannot read {} to fix it: {}", file.path, e));
            return false;
        }
    };

    ctx.log.file(
        &file.path,
        format!("Asking for a fix of {} error(s) in {}", file.diagnostics.len(), file.path),
    );
    let reply = match collect_reply(ctx.services.chat.as_ref(), &build_fix_prompt(file, &original)).await {
        Ok(reply) => reply,
        Err(e) => {
            ctx.log.error(format!("Fix request for {} failed: {}", file.path, e));
            return false;
        }
    };

    let Some(fixed) = extract_fixed_content(&reply) else {
        ctx.log.warning(format!("No usable fix in the reply for {}", file.path));
        return false;
    };
    if fixed.trim() == original.trim() {
        ctx.log.info(format!("Suggested fix for {} is identical, not writing", file.path));
        return false;
    }

    ctx.write_file(&file.path, &fixed).await.success
}

/// One read-fix-write per file, then a single retry of the command.
pub async fn recover(ctx: &StepContext<'_>, command: &str, files: &[FileDiagnostics]) -> RecoveryOutcome {
    ctx.log.warning(format!(
        "Build errors in {} file(s): {}",
        files.len(),
        files.iter().map(|f| f.path.as_str()).collect::<Vec<_>>().join(", ")
    ));

    let mut fixed = 0usize;
    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(ctx.config.fix_delay()).await;
        }
        if fix_file(ctx, file).await {
            fixed += 1;
        }
    }
    ctx.log.info(format!("Applied fixes to {}/{} file(s)", fixed, files.len()));

    ctx.log.info(format!("Retrying {}", command));
    let retry = ctx.run_shell(command).await;
    if retry.success {
        ctx.log.success(format!("{} succeeded after fixing build errors", command));
        RecoveryOutcome::Recovered
    } else {
        ctx.log.command_error(
            command,
            format!("{} still fails after fixing build errors", command),
            &retry.failure_text(),
        );
        RecoveryOutcome::StillFailing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEXT_OUTPUT: &str = "Failed to compile.\n\n\
        ./src/app/page.tsx:12:5\n\
        Type error: Property 'title' does not exist on type 'Props'.\n\n\
        ./src/components/Header.tsx:3:10: Module not found: Can't resolve './Logo'\n\
        ./src/app/page.tsx:20:1\n\
        Type error: Cannot find name 'foo'.\n";

    #[test]
    fn test_build_failure_detection() {
        assert!(is_build_failure("npm run build", NEXT_OUTPUT));
        assert!(is_build_failure("npx tsc --noEmit", "error TS2304: Cannot find name 'x'."));
        assert!(!is_build_failure("npm run dev", NEXT_OUTPUT));
        assert!(!is_build_failure("npm run build", "npm ERR! missing script: build"));
    }

    #[test]
    fn test_parse_diagnostics_groups_by_file_in_order() {
        let files = parse_diagnostics(NEXT_OUTPUT);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/app/page.tsx");
        assert_eq!(files[0].diagnostics.len(), 2);
        assert_eq!(files[0].diagnostics[0].line, 12);
        assert_eq!(files[0].diagnostics[0].column, 5);
        assert!(files[0].diagnostics[0].message.starts_with("Type error: Property 'title'"));
        assert_eq!(files[1].path, "src/components/Header.tsx");
        assert_eq!(
            files[1].diagnostics[0].message,
            "Module not found: Can't resolve './Logo'"
        );
    }

    #[test]
    fn test_extract_fixed_content_from_json() {
        let reply = "Here you go:\n{\"fixedCode\": \"export const a = 1;\\n\"}";
        assert_eq!(extract_fixed_content(reply).as_deref(), Some("export const a = 1;\n"));
    }

    #[test]
    fn test_extract_fixed_content_from_fence() {
        let reply = "Fixed:\n```tsx\nexport default function Page() {}\n```\n";
        assert_eq!(
            extract_fixed_content(reply).as_deref(),
            Some("export default function Page() {}\n")
        );
        assert_eq!(extract_fixed_content("I could not fix it."), None);
    }

    #[test]
    fn test_fix_prompt_lists_errors() {
        let files = parse_diagnostics(NEXT_OUTPUT);
        let prompt = build_fix_prompt(&files[0], "const x = 1;");
        assert!(prompt.contains("- line 12, column 5: Type error"));
        assert!(prompt.contains("const x = 1;"));
    }
}
