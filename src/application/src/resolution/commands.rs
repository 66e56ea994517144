//! Shell commands and package names mentioned by a step.

use super::targets::{find_task_for_step, parenthetical_entries};
use domain::models::{PlanDocument, TaskKind};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Binaries a parenthetical or backticked entry must start with to count as a command.
pub const KNOWN_BINARIES: &[&str] = &[
    "npm", "npx", "yarn", "pnpm", "bun", "node", "deno", "tsc", "next", "vite", "python",
    "python3", "pip", "pip3", "pytest", "poetry", "uvicorn", "go", "cargo", "rustc", "mvn",
    "gradle", "./gradlew", "dotnet", "java", "make", "php", "composer", "ruby", "bundle",
    "rails", "flutter", "dart",
];

static BACKTICK: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("backtick pattern is valid"));

/// Per-ecosystem command heads, searched anywhere in the step text. The
/// arguments that follow a head are picked up by `extend_arguments`.
static ECOSYSTEM_COMMANDS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b(?:npm|pnpm|yarn|bun)\s+(?:run\s+[\w:\-]+(?:\.[\w:\-]+)*|(?:test|start|build|dev|lint|ci)\b)",
        r"\bnpx\s+[\w@/:\-]+(?:\.[\w@/:\-]+)*",
        r"\bgo\s+(?:run|build|test)\b",
        r"\bcargo\s+(?:run|build|test|check|clippy)\b",
        r"\bmvn\s+(?:clean\s+)?(?:install|package|test|compile|spring-boot:run)\b",
        r"(?:\./gradlew|\bgradle)\s+(?:clean\s+)?(?:build|test|bootRun|run)\b",
        r"\bpython3?\s+[\w./\-]+\.py\b",
        r"\bpytest\b",
        r"\bdotnet\s+(?:run|build|test|watch)\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("ecosystem command pattern is valid"))
    .collect()
});

/// One argument following a command head on the same line.
static NEXT_ARGUMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]+([^\s`]+)").expect("argument pattern is valid"));

/// Words that end a command's arguments in running text.
const ARGUMENT_STOP_WORDS: &[&str] = &[
    "then", "and", "or", "to", "for", "with", "in", "on", "after", "before", "once", "until",
    "using", "via", "again", "now", "first",
];

/// Keyword to command fallback when nothing explicit is written. English
/// keywords only match whole words.
static INFERRED_COMMANDS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"개발\s*서버", "npm run dev"),
        (r"(?i)\bdev\s+server\b", "npm run dev"),
        (r"서버", "npm run dev"),
        (r"(?i)\bserver\b", "npm run dev"),
        (r"빌드", "npm run build"),
        (r"(?i)\bbuild\b", "npm run build"),
        (r"테스트", "npm test"),
        (r"(?i)\btests?\b", "npm test"),
    ]
    .iter()
    .map(|(pattern, command)| {
        (
            Regex::new(pattern).expect("inferred command pattern is valid"),
            *command,
        )
    })
    .collect()
});

static PACKAGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@?[A-Za-z0-9][\w.\-]*(?:/[\w.\-]+)?(?:@[\w.\-^~]+)?$").expect("package name pattern is valid")
});

static INLINE_INSTALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:npm\s+(?:install|i|add)|yarn\s+add|pnpm\s+(?:add|install)|bun\s+add|pip3?\s+install|cargo\s+add|go\s+get)\s+([^\n`()]+)",
    )
    .expect("inline install pattern is valid")
});

static DEV_DEPENDENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:-D|--save-dev|--dev)\b|dev\s*dependenc|devdependencies|개발\s*의존성")
        .expect("dev dependency pattern is valid")
});

/// Words that end an inline package list.
const STOP_WORDS: &[&str] = &["and", "to", "for", "with", "then", "in", "as", "및", "으로", "설치"];

fn base_binary(command: &str) -> Option<&str> {
    command
        .split_whitespace()
        .find(|token| !(token.contains('=') && !token.starts_with('=')))
}

/// True when the text starts with an allow-listed binary.
pub fn is_known_command(text: &str) -> bool {
    base_binary(text).is_some_and(|binary| KNOWN_BINARIES.contains(&binary))
}

/// True when any ecosystem command shape occurs in the text.
pub fn mentions_ecosystem_command(text: &str) -> bool {
    ECOSYSTEM_COMMANDS.iter().any(|re| re.is_match(text))
}

fn push_unique(list: &mut Vec<String>, command: &str) {
    let command = command.trim();
    if !command.is_empty() && !list.iter().any(|c| c == command) {
        list.push(command.to_string());
    }
}

fn explicit_commands(description: &str) -> Vec<String> {
    let mut commands = Vec::new();
    for entry in parenthetical_entries(description) {
        if is_known_command(&entry) {
            push_unique(&mut commands, &entry);
        }
    }
    for caps in BACKTICK.captures_iter(description) {
        if let Some(quoted) = caps.get(1).map(|m| m.as_str()) {
            if is_known_command(quoted) {
                push_unique(&mut commands, quoted);
            }
        }
    }
    commands
}

/// End of the command whose head ends at `head_end`, extended over the
/// arguments that follow it. Stops at a stop word, a non-ASCII word or
/// closing punctuation.
fn extend_arguments(text: &str, head_end: usize) -> usize {
    let mut end = head_end;
    while let Some(caps) = NEXT_ARGUMENT.captures(&text[end..]) {
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            break;
        };
        let raw = token.as_str();
        let mut argument = raw.trim_end_matches([',', ';', ')', ':']);
        if argument.len() == raw.len() && raw.len() > 1 && raw.ends_with('.') && !raw.ends_with("..") {
            argument = &raw[..raw.len() - 1];
        }
        if argument.is_empty()
            || !argument.is_ascii()
            || argument.starts_with('(')
            || ARGUMENT_STOP_WORDS.contains(&argument.to_ascii_lowercase().as_str())
        {
            break;
        }

        end += whole.end() - (raw.len() - argument.len());
        if argument.len() < raw.len() {
            break;
        }
    }
    end
}

fn ecosystem_commands(description: &str) -> Vec<String> {
    let mut found: Vec<(usize, usize)> = ECOSYSTEM_COMMANDS
        .iter()
        .flat_map(|re| re.find_iter(description).map(|m| (m.start(), m.end())))
        .collect();
    found.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut commands = Vec::new();
    let mut covered_until = 0;
    for (start, head_end) in found {
        if start < covered_until {
            continue;
        }
        let end = extend_arguments(description, head_end);
        push_unique(&mut commands, &description[start..end]);
        covered_until = end;
    }
    commands
}

fn inferred_commands(description: &str) -> Vec<String> {
    let mut hits: Vec<(usize, &str)> = INFERRED_COMMANDS
        .iter()
        .filter_map(|(keyword, command)| keyword.find(description).map(|m| (m.start(), *command)))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);

    let mut commands = Vec::new();
    for (_, command) in hits {
        push_unique(&mut commands, command);
    }
    commands
}

/// Commands for a step. The first layer that yields anything wins:
/// explicit parenthetical or backticked commands, ecosystem command shapes,
/// the matching task's `command`, then keyword inference.
pub fn extract_commands(description: &str, plan: &PlanDocument) -> Vec<String> {
    let explicit = explicit_commands(description);
    if !explicit.is_empty() {
        return explicit;
    }

    let ecosystem = ecosystem_commands(description);
    if !ecosystem.is_empty() {
        return ecosystem;
    }

    if let Some((_, task)) = find_task_for_step(description, plan) {
        if let Some(command) = task.command.as_deref().filter(|c| !c.trim().is_empty()) {
            return vec![command.trim().to_string()];
        }
    }

    inferred_commands(description)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Yarn,
    Pnpm,
    Pip,
    Cargo,
    Go,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Pip => "pip",
            PackageManager::Cargo => "cargo",
            PackageManager::Go => "go",
        };
        write!(f, "{}", name)
    }
}

impl PackageManager {
    /// Manager named or implied by the text, npm otherwise.
    pub fn infer(text: &str) -> Self {
        let lowered = text.to_lowercase();
        let has_word = |word: &str| {
            lowered
                .split(|c: char| !c.is_alphanumeric())
                .any(|token| token == word)
        };

        if has_word("pip") || has_word("pip3") || lowered.contains("requirements.txt") || has_word("python") {
            PackageManager::Pip
        } else if has_word("cargo") || has_word("crate") || has_word("crates") {
            PackageManager::Cargo
        } else if lowered.contains("go get") || lowered.contains("go module") {
            PackageManager::Go
        } else if has_word("pnpm") {
            PackageManager::Pnpm
        } else if has_word("yarn") {
            PackageManager::Yarn
        } else {
            PackageManager::Npm
        }
    }

    /// Install command line for the packages.
    pub fn install_command(&self, packages: &[String], dev: bool) -> String {
        let (base, dev_flag) = match self {
            PackageManager::Npm => ("npm install", "-D"),
            PackageManager::Yarn => ("yarn add", "-D"),
            PackageManager::Pnpm => ("pnpm add", "-D"),
            PackageManager::Pip => ("pip install", ""),
            PackageManager::Cargo => ("cargo add", "--dev"),
            PackageManager::Go => ("go get", ""),
        };

        let mut parts = vec![base.to_string()];
        if dev && !dev_flag.is_empty() {
            parts.push(dev_flag.to_string());
        }
        parts.extend(packages.iter().cloned());
        parts.join(" ")
    }
}

fn is_package_name(token: &str) -> bool {
    PACKAGE_NAME.is_match(token) && !STOP_WORDS.contains(&token)
}

/// Parenthetical entries, when they read as a package list: several
/// package names, or one that is scoped, hyphenated or listed in the plan.
/// A lone remark such as "(optional)" is not a package.
fn parenthetical_packages(description: &str, plan: &PlanDocument) -> Vec<String> {
    let entries = parenthetical_entries(description);
    let mut candidates = Vec::new();
    for entry in &entries {
        if is_package_name(entry) {
            push_unique(&mut candidates, entry);
        }
    }

    let planned = &plan.planning.plan.packages;
    let several = candidates.len() > 1 && candidates.len() == entries.len();
    let distinctive = candidates
        .iter()
        .any(|c| c.contains(['-', '@', '/']) || planned.iter().any(|p| p == c));
    if several || distinctive {
        candidates
    } else {
        Vec::new()
    }
}

/// Packages a step asks for: a parenthetical list, inline install command
/// arguments, then the plan's `packages`.
pub fn extract_packages(description: &str, plan: &PlanDocument) -> Vec<String> {
    let mut packages = parenthetical_packages(description, plan);
    if !packages.is_empty() {
        return packages;
    }

    for caps in INLINE_INSTALL.captures_iter(description) {
        let Some(arguments) = caps.get(1) else { continue };
        for token in arguments.as_str().split_whitespace() {
            if token.starts_with('-') {
                continue;
            }
            let token = token.trim_end_matches([',', '.', ';']);
            if !is_package_name(token) {
                break;
            }
            push_unique(&mut packages, token);
        }
    }
    if !packages.is_empty() {
        return packages;
    }

    for package in &plan.planning.plan.packages {
        push_unique(&mut packages, package);
    }
    packages
}

/// True when the step asks for development-only dependencies.
pub fn wants_dev_dependencies(description: &str) -> bool {
    DEV_DEPENDENCY.is_match(description)
}

/// Install command for a step, or `None` when no package can be found.
pub fn install_command_for(description: &str, plan: &PlanDocument) -> Option<String> {
    let packages = extract_packages(description, plan);
    if packages.is_empty() {
        return None;
    }
    let manager = PackageManager::infer(description);
    Some(manager.install_command(&packages, wants_dev_dependencies(description)))
}

/// Commands carried by install tasks, used when an install step has no
/// packages of its own.
pub fn install_task_command(description: &str, plan: &PlanDocument) -> Option<String> {
    find_task_for_step(description, plan)
        .filter(|(_, task)| task.kind == TaskKind::Install)
        .and_then(|(_, task)| task.command.clone())
        .filter(|command| !command.trim().is_empty())
}
