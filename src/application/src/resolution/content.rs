//! Stage three of target resolution: where the bytes for a file come from.
//!
//! Stages run in order and the first one that produces content wins, so a
//! code block always beats task content and both beat the template.

use super::targets::{match_path, normalize_path, FULL_CHAIN, FUZZY_CHAIN};
use domain::models::{FileDescriptor, PlanDocument, TaskKind};
use shared::text_processing::{basename, extension};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    CodeBlock(usize),
    Task(usize),
    Template,
}

impl fmt::Display for ContentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSource::CodeBlock(i) => write!(f, "codeBlocks[{}]", i),
            ContentSource::Task(i) => write!(f, "tasks[{}]", i),
            ContentSource::Template => write!(f, "template"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub content: String,
    pub source: ContentSource,
}

pub trait ContentStage: Send + Sync {
    fn name(&self) -> &'static str;
    fn resolve(&self, target: &FileDescriptor, plan: &PlanDocument) -> Option<ResolvedContent>;
}

fn non_empty(content: Option<&str>) -> Option<&str> {
    content.filter(|c| !c.trim().is_empty())
}

/// Code block whose `file_path` equals the target, then a suffix or
/// basename match.
pub struct CodeBlockStage;

impl ContentStage for CodeBlockStage {
    fn name(&self) -> &'static str {
        "code block"
    }

    fn resolve(&self, target: &FileDescriptor, plan: &PlanDocument) -> Option<ResolvedContent> {
        let target_path = normalize_path(&target.path);
        let blocks = plan.code_blocks();

        let exact = blocks
            .iter()
            .position(|b| normalize_path(&b.file_path) == target_path && non_empty(b.content.as_deref()).is_some());
        let index = exact.or_else(|| {
            let candidates: Vec<&str> = blocks
                .iter()
                .map(|b| match non_empty(b.content.as_deref()) {
                    Some(_) => b.file_path.as_str(),
                    None => "",
                })
                .collect();
            match_path(&target_path, &candidates, FUZZY_CHAIN)
        })?;

        let content = non_empty(blocks[index].content.as_deref())?;
        Some(ResolvedContent {
            content: content.to_string(),
            source: ContentSource::CodeBlock(index),
        })
    }
}

/// Content carried by a create or modify task whose target matches.
pub struct TaskStage;

impl ContentStage for TaskStage {
    fn name(&self) -> &'static str {
        "task"
    }

    fn resolve(&self, target: &FileDescriptor, plan: &PlanDocument) -> Option<ResolvedContent> {
        let tasks = plan.tasks();
        let candidates: Vec<&str> = tasks
            .iter()
            .map(|task| {
                let writes_files = matches!(task.kind, TaskKind::Create | TaskKind::Modify);
                match (writes_files, task.target.as_deref(), non_empty(task.content.as_deref())) {
                    (true, Some(path), Some(_)) => path,
                    _ => "",
                }
            })
            .collect();

        let index = match_path(&target.path, &candidates, FULL_CHAIN)?;
        let content = non_empty(tasks[index].content.as_deref())?;
        Some(ResolvedContent {
            content: content.to_string(),
            source: ContentSource::Task(index),
        })
    }
}

/// Boilerplate keyed on the file extension. Always produces content.
pub struct TemplateStage;

impl ContentStage for TemplateStage {
    fn name(&self) -> &'static str {
        "template"
    }

    fn resolve(&self, target: &FileDescriptor, _plan: &PlanDocument) -> Option<ResolvedContent> {
        Some(ResolvedContent {
            content: template_for(&target.path, target.purpose.as_deref()),
            source: ContentSource::Template,
        })
    }
}

fn component_name(path: &str) -> String {
    let file = basename(path);
    let stem = file.split('.').next().unwrap_or(file);
    let name: String = stem
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect();
    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => name,
        Some(_) => format!("Component{}", name),
        None => "Component".to_string(),
    }
}

/// Comment prefix and suffix for an extension.
fn comment_syntax(ext: &str) -> (&'static str, &'static str) {
    match ext {
        "py" | "rb" | "sh" | "yaml" | "yml" | "toml" | "env" | "conf" | "cfg" | "ini"
        | "properties" | "gitignore" | "dockerignore" | "r" => ("# ", ""),
        "html" | "htm" | "xml" | "md" | "mdx" | "svg" => ("<!-- ", " -->"),
        "css" | "scss" | "sass" | "less" => ("/* ", " */"),
        "sql" | "lua" => ("-- ", ""),
        _ => ("// ", ""),
    }
}

/// Stub content for a file nothing in the plan supplies content for.
pub fn template_for(path: &str, purpose: Option<&str>) -> String {
    let ext = extension(path).unwrap_or_default();
    let name = component_name(path);
    let summary = purpose
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("TODO: implement {}", basename(path)));

    match ext.as_str() {
        "tsx" | "jsx" => format!(
            "// {summary}\nexport default function {name}() {{\n  return (\n    <div>\n      <h1>{name}</h1>\n    </div>\n  );\n}}\n"
        ),
        "vue" => format!(
            "<!-- {summary} -->\n<template>\n  <div>\n    <h1>{name}</h1>\n  </div>\n</template>\n\n<script setup>\n</script>\n"
        ),
        "svelte" => format!(
            "<!-- {summary} -->\n<script>\n</script>\n\n<div>\n  <h1>{name}</h1>\n</div>\n"
        ),
        "json" => "{}\n".to_string(),
        _ => {
            let (open, close) = comment_syntax(&ext);
            format!("{open}{summary}{close}\n")
        }
    }
}

/// Ordered content stages.
pub struct ContentResolver {
    stages: Vec<Box<dyn ContentStage>>,
}

impl ContentResolver {
    pub fn with_stages(stages: Vec<Box<dyn ContentStage>>) -> Self {
        Self { stages }
    }

    /// Code block, then task, then template.
    pub fn standard() -> Self {
        Self::with_stages(vec![
            Box::new(CodeBlockStage),
            Box::new(TaskStage),
            Box::new(TemplateStage),
        ])
    }

    /// Code block, then task. Used where a stub must never be written.
    pub fn without_template() -> Self {
        Self::with_stages(vec![Box::new(CodeBlockStage), Box::new(TaskStage)])
    }

    pub fn resolve(&self, target: &FileDescriptor, plan: &PlanDocument) -> Option<ResolvedContent> {
        self.stages.iter().find_map(|stage| {
            let resolved = stage.resolve(target, plan);
            if resolved.is_some() {
                tracing::debug!("{} resolved via {} stage", target.path, stage.name());
            }
            resolved
        })
    }
}
