use async_trait::async_trait;
use domain::services::{FileSystem, WriteOutcome};
use shared::error::{Error, Result};
use shared::text_processing::normalize_newlines;
use std::path::{Component, Path, PathBuf};

/// Directories never descended into when listing a project.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "target",
    "dist",
    "build",
    ".next",
    "__pycache__",
    ".venv",
    "venv",
];

/// Filesystem collaborator scoped to a project root.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a plan path against the project root, refusing paths that escape it.
    pub fn resolve_path(path: &str, project_root: &Path) -> Result<PathBuf> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("empty file path".to_string()));
        }

        let candidate = Path::new(trimmed);
        let relative = if candidate.is_absolute() {
            candidate.strip_prefix(project_root).map_err(|_| {
                Error::InvalidInput(format!("{} is outside the project root", trimmed))
            })?
        } else {
            candidate
        };

        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)))
        {
            return Err(Error::InvalidInput(format!(
                "{} escapes the project root",
                trimmed
            )));
        }

        Ok(project_root.join(relative))
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read(&self, path: &str, project_root: &Path) -> Result<String> {
        let full_path = Self::resolve_path(path, project_root)?;
        tokio::fs::read_to_string(&full_path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(path.to_string())
            } else {
                Error::Io(format!("Failed to read {}: {}", full_path.display(), e))
            }
        })
    }

    async fn write(&self, path: &str, project_root: &Path, content: &str) -> Result<WriteOutcome> {
        let full_path = match Self::resolve_path(path, project_root) {
            Ok(p) => p,
            Err(e) => {
                return Ok(WriteOutcome {
                    success: false,
                    message: e.to_string(),
                })
            }
        };

        if let Some(parent) = full_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Ok(WriteOutcome {
                    success: false,
                    message: format!("Failed to create {}: {}", parent.display(), e),
                });
            }
        }

        let existed = tokio::fs::try_exists(&full_path).await.unwrap_or(false);
        let normalized = normalize_newlines(content);
        match tokio::fs::write(&full_path, normalized.as_bytes()).await {
            Ok(()) => Ok(WriteOutcome {
                success: true,
                message: format!(
                    "{} {} ({} bytes)",
                    if existed { "Updated" } else { "Created" },
                    path,
                    normalized.len()
                ),
            }),
            Err(e) => Ok(WriteOutcome {
                success: false,
                message: format!("Failed to write {}: {}", path, e),
            }),
        }
    }

    async fn list_files(&self, project_root: &Path, max_depth: usize) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut pending = vec![(project_root.to_path_buf(), 0usize)];

        while let Some((dir, depth)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().to_string();
                let file_type = entry.file_type().await?;
                let path = entry.path();

                if file_type.is_dir() {
                    if depth < max_depth && !IGNORED_DIRS.contains(&name.as_str()) {
                        pending.push((path, depth + 1));
                    }
                } else if let Ok(relative) = path.strip_prefix(project_root) {
                    files.push(relative.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        files.sort();
        Ok(files)
    }
}
