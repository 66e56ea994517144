//! Step execution entry point: classify, dispatch, record.

use crate::execution_log::ExecutionStore;
use crate::handlers::{self, StepContext};
use crate::step_classifier::{ActionKind, StepClassifier};
use domain::entities::StepResult;
use domain::models::PlanDocument;
use domain::services::{ChatClient, ErrorChecker, FileSystem, ShellExecutor, TerminalSink};
use infrastructure::config::ExecutionConfig;
use shared::types::Result;
use std::path::Path;
use std::sync::Arc;

/// Collaborators the engine talks to.
#[derive(Clone)]
pub struct Services {
    pub fs: Arc<dyn FileSystem>,
    pub shell: Arc<dyn ShellExecutor>,
    pub chat: Arc<dyn ChatClient>,
    pub terminal: Option<Arc<dyn TerminalSink>>,
    pub error_checker: Option<Arc<dyn ErrorChecker>>,
}

impl Services {
    pub fn new(fs: Arc<dyn FileSystem>, shell: Arc<dyn ShellExecutor>, chat: Arc<dyn ChatClient>) -> Self {
        Self {
            fs,
            shell,
            chat,
            terminal: None,
            error_checker: None,
        }
    }

    pub fn with_terminal(mut self, terminal: Arc<dyn TerminalSink>) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn with_error_checker(mut self, checker: Arc<dyn ErrorChecker>) -> Self {
        self.error_checker = Some(checker);
        self
    }
}

/// The plan and project a step runs against.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionContext<'a> {
    pub plan: &'a PlanDocument,
    pub project_root: &'a Path,
}

pub struct PlanExecutor {
    services: Services,
    config: ExecutionConfig,
    store: Arc<ExecutionStore>,
    classifier: StepClassifier,
}

impl PlanExecutor {
    pub fn new(services: Services, config: ExecutionConfig, store: Arc<ExecutionStore>) -> Self {
        Self {
            services,
            config,
            store,
            classifier: StepClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: StepClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn store(&self) -> &Arc<ExecutionStore> {
        &self.store
    }

    pub fn classifier(&self) -> &StepClassifier {
        &self.classifier
    }

    /// Execute one step. Never fails: every problem ends up in the returned
    /// result and the step's log.
    pub async fn execute_step(
        &self,
        step_index: usize,
        description: &str,
        context: &ExecutionContext<'_>,
    ) -> StepResult {
        let run = self.store.begin(step_index);
        let log = self.store.logger(step_index);
        log.info(format!("Executing step {} (run {}): {}", step_index + 1, run, description));

        let result = match self.classifier.matching_rule(description, context.plan) {
            None => {
                log.error("No action kind matches this step");
                StepResult::failure(format!(
                    "Cannot execute step: no recognizable action in \"{}\"",
                    description
                ))
            }
            Some(rule) => {
                log.info(format!("Classified as {} ({})", rule.kind, rule.name));
                let ctx = StepContext {
                    step_index,
                    description,
                    plan: context.plan,
                    project_root: context.project_root,
                    services: &self.services,
                    config: &self.config,
                    store: &self.store,
                    log: log.clone(),
                };
                match dispatch(rule.kind, &ctx).await {
                    Ok(result) => result,
                    Err(e) => {
                        log.error(format!("Step aborted: {:#}", e));
                        StepResult::failure(format!("Step failed: {}", e))
                    }
                }
            }
        };

        self.store.finish(step_index, &result);
        result
    }

    /// Execute the plan's steps in order, stopping at the first failure
    /// unless `keep_going` is set.
    pub async fn execute_all(&self, context: &ExecutionContext<'_>, keep_going: bool) -> Vec<(usize, StepResult)> {
        let mut results = Vec::new();
        for (index, description) in context.plan.steps().iter().enumerate() {
            let result = self.execute_step(index, description, context).await;
            let failed = !result.success;
            results.push((index, result));
            if failed && !keep_going {
                tracing::warn!("Stopping after failed step {}", index + 1);
                break;
            }
        }
        results
    }
}

async fn dispatch(kind: ActionKind, ctx: &StepContext<'_>) -> Result<StepResult> {
    match kind {
        ActionKind::Install => handlers::install::execute(ctx).await,
        ActionKind::Create => handlers::create::execute(ctx).await,
        ActionKind::Modify => handlers::modify::execute(ctx).await,
        ActionKind::Command => handlers::command::execute(ctx).await,
        ActionKind::TaskExecution => handlers::task::execute(ctx).await,
        ActionKind::EnvironmentVariable => handlers::environment::execute(ctx).await,
        ActionKind::ConfigFile => handlers::config_file::execute(ctx).await,
        ActionKind::Information => handlers::analysis::execute(ctx).await,
    }
}
