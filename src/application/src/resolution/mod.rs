//! Resolution strategy: recover targets, content and commands for a step
//! from the loosely structured plan.
//!
//! Steps carry no reference to tasks, code blocks or file descriptors, so
//! everything here is re-derived from the step text on every execution.

pub mod commands;
pub mod content;
pub mod targets;

pub use commands::{extract_commands, extract_packages, install_command_for, PackageManager};
pub use content::{ContentResolver, ContentSource, ContentStage, ResolvedContent};
pub use targets::{
    extract_target_names, find_task_for_step, match_descriptor, match_path, resolve_descriptors,
    MatchStrategy, TargetList,
};
