//! Plan document produced upstream by the planning phase.
//!
//! The engine only ever reads these types. `execution_order` holds free text,
//! so nothing here links a step to a task, code block or file descriptor.

use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDocument {
    #[serde(default)]
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub planning: Planning,
}

impl PlanDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("plan file {}", path.display()))
            } else {
                Error::from(e)
            }
        })?;
        Self::from_json(&content)
    }

    pub fn steps(&self) -> &[String] {
        &self.planning.plan.execution_order
    }

    pub fn tasks(&self) -> &[Task] {
        &self.planning.tasks
    }

    pub fn code_blocks(&self) -> &[CodeBlock] {
        &self.planning.code_blocks
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetadata {
    #[serde(default)]
    pub user_request: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub project_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Planning {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub questions: Vec<String>,
    #[serde(default)]
    pub is_clear: bool,
    #[serde(default)]
    pub ready_to_execute: bool,
    #[serde(default)]
    pub plan: PlanBody,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlock>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanBody {
    #[serde(default)]
    pub action_type: String,
    #[serde(default)]
    pub packages: Vec<String>,
    #[serde(default)]
    pub files_to_create: Vec<FileDescriptor>,
    #[serde(default)]
    pub files_to_modify: Vec<FileDescriptor>,
    /// Ordered, human readable step descriptions.
    #[serde(default)]
    pub execution_order: Vec<String>,
}

/// An intended file creation or modification. Carries no content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub path: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
    #[serde(default)]
    pub file_exists: bool,
}

impl FileDescriptor {
    /// Descriptor built from a bare name when nothing in the plan matched it.
    pub fn synthesized(path: &str) -> Self {
        Self {
            path: path.to_string(),
            reason: "derived from step description".to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Install,
    Create,
    Modify,
    Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}
