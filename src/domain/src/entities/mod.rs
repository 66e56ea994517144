pub mod execution;

pub use execution::{ExecutionLogEntry, LogKind, StepResult, StepStatus};
