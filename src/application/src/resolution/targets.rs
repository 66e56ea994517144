//! Stage one and two of target resolution: pull file names out of a step
//! description and match them against the plan's file lists.

use domain::models::{FileDescriptor, PlanDocument, Task, TaskKind};
use once_cell::sync::Lazy;
use regex::Regex;
use shared::text_processing::{basename, extension};

static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(([^()]+)\)").expect("parenthetical pattern is valid"));

static PATH_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\./)?(?:[A-Za-z0-9_@\[\]()\-]+/)*\.?[A-Za-z0-9_@\[\]\-]+(?:\.[A-Za-z0-9_\-]+)*\.[A-Za-z][A-Za-z0-9]*")
        .expect("path token pattern is valid")
});

static FILE_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)create|generate|modify|update|edit|change|생성|만들|수정|변경")
        .expect("file action pattern is valid")
});

/// Extensions accepted when deciding whether a token names a file.
const FILE_EXTENSIONS: &[&str] = &[
    "js", "jsx", "ts", "tsx", "mjs", "cjs", "vue", "svelte", "astro", "json", "css", "scss",
    "sass", "less", "html", "htm", "md", "mdx", "py", "go", "rs", "java", "kt", "kts",
    "swift", "rb", "php", "cs", "cpp", "cc", "c", "h", "hpp", "yaml", "yml", "toml", "xml",
    "sql", "sh", "txt", "ini", "gradle", "properties", "graphql", "gql", "prisma", "dart",
    "env", "lock", "conf", "cfg",
];

/// Framework names that look like files in prose ("a Next.js app").
const FRAMEWORK_NAMES: &[&str] = &[
    "next.js", "node.js", "vue.js", "react.js", "nuxt.js", "express.js", "three.js", "d3.js",
    "nest.js", "solid.js", "ember.js", "backbone.js", "alpine.js",
];

/// Which plan file list a handler treats as authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetList {
    Create,
    Modify,
}

impl TargetList {
    fn primary<'p>(&self, plan: &'p PlanDocument) -> &'p [FileDescriptor] {
        match self {
            TargetList::Create => &plan.planning.plan.files_to_create,
            TargetList::Modify => &plan.planning.plan.files_to_modify,
        }
    }

    fn secondary<'p>(&self, plan: &'p PlanDocument) -> &'p [FileDescriptor] {
        match self {
            TargetList::Create => &plan.planning.plan.files_to_modify,
            TargetList::Modify => &plan.planning.plan.files_to_create,
        }
    }

    fn task_kind(&self) -> TaskKind {
        match self {
            TargetList::Create => TaskKind::Create,
            TargetList::Modify => TaskKind::Modify,
        }
    }
}

/// Does this token plausibly name a file rather than a word or a package?
pub fn looks_like_file_name(token: &str) -> bool {
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) || token.len() > 200 {
        return false;
    }
    if FRAMEWORK_NAMES.contains(&token.to_ascii_lowercase().as_str()) {
        return false;
    }
    match extension(token) {
        Some(ext) => FILE_EXTENSIONS.contains(&ext.as_str()),
        None => false,
    }
}

/// Entries of every `( … )` group, split on commas.
pub fn parenthetical_entries(text: &str) -> Vec<String> {
    PARENTHETICAL
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .flat_map(|group| group.as_str().split([',', '、', ';']))
        .map(|entry| entry.trim().trim_matches(['`', '"', '\'']).trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Path-like tokens in order of appearance.
pub fn path_tokens(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for found in PATH_TOKEN.find_iter(text) {
        let token = found
            .as_str()
            .trim_end_matches(['.', ')', ','])
            .trim_start_matches('(');
        if looks_like_file_name(token) {
            push_unique(&mut tokens, normalize_path(token));
        }
    }
    tokens
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

/// Strip `./`, leading slashes and Windows separators.
pub fn normalize_path(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut trimmed = unified.as_str();
    while let Some(rest) = trimmed.strip_prefix("./") {
        trimmed = rest;
    }
    trimmed.trim_start_matches('/').to_string()
}

/// Task whose description is the step text, or contains / is contained in it.
pub fn find_task_for_step<'p>(description: &str, plan: &'p PlanDocument) -> Option<(usize, &'p Task)> {
    let step = description.trim().to_lowercase();
    if step.is_empty() {
        return None;
    }

    let described = plan
        .tasks()
        .iter()
        .enumerate()
        .filter_map(|(i, task)| task.description.as_deref().map(|d| (i, task, d.trim().to_lowercase())))
        .filter(|(_, _, d)| !d.is_empty());

    let mut partial = None;
    for (i, task, task_description) in described {
        if task_description == step {
            return Some((i, task));
        }
        if partial.is_none()
            && task_description.chars().count() >= 8
            && step.chars().count() >= 8
            && (step.contains(&task_description) || task_description.contains(&step))
        {
            partial = Some((i, task));
        }
    }
    partial
}

/// Stage one: names a step refers to, through the layered fallback chain.
pub fn extract_target_names(
    description: &str,
    plan: &PlanDocument,
    step_index: usize,
    list: TargetList,
) -> Vec<String> {
    let mut names = Vec::new();
    for entry in parenthetical_entries(description) {
        if looks_like_file_name(&entry) {
            push_unique(&mut names, normalize_path(&entry));
        }
    }
    if !names.is_empty() {
        return names;
    }

    if FILE_ACTION.is_match(description) {
        let tokens = path_tokens(description);
        if !tokens.is_empty() {
            return tokens;
        }
    }

    let lowered = description.to_lowercase();
    for task in plan.tasks().iter().filter(|t| t.kind == list.task_kind()) {
        if let Some(target) = task.target.as_deref() {
            let name = basename(target).to_lowercase();
            if !name.is_empty() && lowered.contains(&name) {
                push_unique(&mut names, normalize_path(target));
            }
        }
    }
    if !names.is_empty() {
        return names;
    }

    list.primary(plan)
        .get(step_index)
        .map(|descriptor| vec![normalize_path(&descriptor.path)])
        .unwrap_or_default()
}

/// One rung of the path matching ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    Exact,
    Suffix,
    Prefix,
    Basename,
    BasenameSubstring,
    Substring,
}

/// Every rung, strictest first.
pub const FULL_CHAIN: &[MatchStrategy] = &[
    MatchStrategy::Exact,
    MatchStrategy::Suffix,
    MatchStrategy::Prefix,
    MatchStrategy::Basename,
    MatchStrategy::BasenameSubstring,
    MatchStrategy::Substring,
];

/// Rungs used for the fuzzy code block lookup.
pub const FUZZY_CHAIN: &[MatchStrategy] = &[MatchStrategy::Suffix, MatchStrategy::Basename];

fn matches(strategy: MatchStrategy, name: &str, candidate: &str) -> bool {
    match strategy {
        MatchStrategy::Exact => candidate == name,
        MatchStrategy::Suffix => {
            candidate.ends_with(&format!("/{}", name)) || name.ends_with(&format!("/{}", candidate))
        }
        MatchStrategy::Prefix => candidate.starts_with(name) || name.starts_with(candidate),
        MatchStrategy::Basename => basename(candidate).eq_ignore_ascii_case(basename(name)),
        MatchStrategy::BasenameSubstring => {
            let candidate_base = basename(candidate).to_lowercase();
            let name_base = basename(name).to_lowercase();
            candidate_base.contains(&name_base) || name_base.contains(&candidate_base)
        }
        MatchStrategy::Substring => {
            let candidate = candidate.to_lowercase();
            let name = name.to_lowercase();
            candidate.contains(&name) || name.contains(&candidate)
        }
    }
}

/// Index of the first candidate matched by the strictest applicable strategy.
pub fn match_path<S: AsRef<str>>(name: &str, candidates: &[S], chain: &[MatchStrategy]) -> Option<usize> {
    let name = normalize_path(name);
    if name.is_empty() {
        return None;
    }
    let normalized: Vec<String> = candidates.iter().map(|c| normalize_path(c.as_ref())).collect();

    chain.iter().find_map(|strategy| {
        normalized
            .iter()
            .position(|candidate| !candidate.is_empty() && matches(*strategy, &name, candidate))
    })
}

/// Stage two: match one name against the authoritative list, then the other
/// list, and synthesize a descriptor when nothing matches.
pub fn match_descriptor(name: &str, plan: &PlanDocument, list: TargetList) -> FileDescriptor {
    for descriptors in [list.primary(plan), list.secondary(plan)] {
        let paths: Vec<&str> = descriptors.iter().map(|d| d.path.as_str()).collect();
        if let Some(i) = match_path(name, &paths, FULL_CHAIN) {
            return descriptors[i].clone();
        }
    }
    FileDescriptor::synthesized(&normalize_path(name))
}

/// Stages one and two together, deduplicated by path.
pub fn resolve_descriptors(
    description: &str,
    plan: &PlanDocument,
    step_index: usize,
    list: TargetList,
) -> Vec<FileDescriptor> {
    let mut descriptors: Vec<FileDescriptor> = Vec::new();
    for name in extract_target_names(description, plan, step_index, list) {
        let descriptor = match_descriptor(&name, plan, list);
        if !descriptors.iter().any(|d| d.path == descriptor.path) {
            descriptors.push(descriptor);
        }
    }
    descriptors
}
