//! Adds or replaces one `NAME=value` line in a dotenv file.

use super::StepContext;
use domain::entities::StepResult;
use once_cell::sync::Lazy;
use regex::Regex;
use shared::types::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvAssignment {
    pub name: String,
    pub value: String,
}

/// Phrasings tried in order; each captures the name and, except the last, a value.
static ASSIGNMENT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // API_URL=http://localhost:8080
        r#"\b([A-Z][A-Z0-9_]*)\s*=\s*("[^"]*"|'[^']*'|[^\s,)]+)"#,
        // API_URL을 http://localhost:8080로 설정
        r#"\b([A-Z][A-Z0-9_]*)\s*(?:을|를|에|의)?\s*(?:값\s*)?[`"']?([^\s`"']+?)[`"']?\s*(?:으로|로)\s*(?:설정|추가|지정)"#,
        // set API_URL to http://localhost:8080
        r#"(?i:set)\s+([A-Z][A-Z0-9_]*)\s+(?i:to|as)\s+[`"']?([^\s`"']+)"#,
        // API_KEY 추가 (예: sk-123)
        r#"\b([A-Z][A-Z0-9_]*)\b[^\n]*?(?:예|e\.g\.|example)\s*[:：]?\s*[`"']?([^\s`"'),]+)"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("env assignment pattern is valid"))
    .collect()
});

static NAME_ONLY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][A-Z0-9]*_[A-Z0-9_]+|[A-Z]{3,})\b").expect("env name pattern is valid")
});

static ENV_FILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[\s(`'\x22/])(\.env(?:\.[A-Za-z0-9_\-]+)?)").expect("env file pattern is valid")
});

/// Upper-case words that are never variable names.
const NOT_VARIABLES: &[&str] = &["API", "URL", "ENV", "JSON", "HTTP", "HTTPS", "README", "TODO", "NPM"];

fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].to_string();
        }
    }
    value.to_string()
}

/// Variable name and value described by the step.
pub fn parse_env_assignment(text: &str) -> Option<EnvAssignment> {
    for pattern in ASSIGNMENT_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            let (Some(name), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if NOT_VARIABLES.contains(&name.as_str()) {
                continue;
            }
            return Some(EnvAssignment {
                name: name.as_str().to_string(),
                value: unquote(value.as_str()),
            });
        }
    }

    NAME_ONLY
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|name| !NOT_VARIABLES.contains(name))
        .map(|name| EnvAssignment {
            name: name.to_string(),
            value: String::new(),
        })
}

/// Dotenv file named in the step, `.env` otherwise.
pub fn env_file_name(text: &str) -> String {
    ENV_FILE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim_end_matches(['.', ',']).to_string())
        .unwrap_or_else(|| ".env".to_string())
}

fn format_value(value: &str) -> String {
    if value.contains(char::is_whitespace) || value.contains('#') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Replace the `NAME=` line (optionally `export`-prefixed) or append one.
pub fn upsert_env_line(content: &str, assignment: &EnvAssignment) -> String {
    let line = format!("{}={}", assignment.name, format_value(&assignment.value));
    let prefix = format!("{}=", assignment.name);

    let mut replaced = false;
    let mut lines: Vec<String> = content
        .lines()
        .map(|existing| {
            let trimmed = existing.trim_start();
            let bare = trimmed.strip_prefix("export ").unwrap_or(trimmed).trim_start();
            if !replaced && bare.starts_with(&prefix) {
                replaced = true;
                line.clone()
            } else {
                existing.to_string()
            }
        })
        .collect();

    if !replaced {
        lines.push(line);
    }
    let mut updated = lines.join("\n");
    updated.push('\n');
    updated
}

pub async fn execute(ctx: &StepContext<'_>) -> Result<StepResult> {
    let Some(assignment) = parse_env_assignment(ctx.description) else {
        ctx.log.error("No environment variable name found in step");
        return Ok(StepResult::failure("No environment variable found in step"));
    };
    if assignment.value.is_empty() {
        ctx.log.warning(format!("No value given for {}, writing it empty", assignment.name));
    }

    let file = env_file_name(ctx.description);
    let existing = match ctx.services.fs.read(&file, ctx.project_root).await {
        Ok(content) => content,
        Err(e) if e.is_not_found() => {
            ctx.log.info(format!("{} does not exist yet, creating it", file));
            String::new()
        }
        Err(e) => {
            ctx.log.file_error(&file, format!("Failed to read {}: {}", file, e));
            return Ok(StepResult::failure(format!("Failed to read {}: {}", file, e)));
        }
    };

    let updated = upsert_env_line(&existing, &assignment);
    let outcome = ctx.write_file(&file, &updated).await;
    if !outcome.success {
        return Ok(StepResult::failure(format!(
            "Failed to write {}: {}",
            file, outcome.message
        )));
    }

    ctx.log.success(format!("Set {} in {}", assignment.name, file));
    Ok(StepResult::success(format!("Set {} in {}", assignment.name, file)))
}
