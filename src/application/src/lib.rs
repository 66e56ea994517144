pub mod execution_log;
pub mod handlers;
pub mod plan_executor;
pub mod recovery;
pub mod resolution;
pub mod step_classifier;

pub use execution_log::{ExecutionStore, StepLogger};
pub use plan_executor::{ExecutionContext, PlanExecutor, Services};
pub use step_classifier::{ActionKind, StepClassifier};

use domain::services::TerminalSink;
use infrastructure::{config::Config, LocalFileSystem, LocalShellExecutor, ProcessRegistry, SseChatClient};
use std::sync::Arc;

/// Executor wired to the local filesystem, the allow-listed shell and the
/// configured chat endpoint.
pub fn create_plan_executor(
    config: &Config,
    registry: Arc<ProcessRegistry>,
    terminal: Option<Arc<dyn TerminalSink>>,
) -> shared::types::Result<PlanExecutor> {
    let chat = SseChatClient::new(&config.llm)?;
    let shell = LocalShellExecutor::new(&config.shell, registry);

    let mut services = Services::new(Arc::new(LocalFileSystem::new()), Arc::new(shell), Arc::new(chat));
    if let Some(terminal) = terminal {
        services = services.with_terminal(terminal);
    }

    Ok(PlanExecutor::new(
        services,
        config.execution.clone(),
        Arc::new(ExecutionStore::new()),
    ))
}
