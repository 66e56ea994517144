use crate::support::*;
use application::{ExecutionContext, ExecutionStore, PlanExecutor, Services};
use domain::models::PlanDocument;
use infrastructure::config::ExecutionConfig;
use infrastructure::LocalFileSystem;
use std::sync::Arc;

fn local_executor() -> PlanExecutor {
    let services = Services::new(
        Arc::new(LocalFileSystem::new()),
        Arc::new(ScriptedShell::new()),
        Arc::new(ScriptedChat::new()),
    );
    PlanExecutor::new(services, ExecutionConfig::without_delays(), Arc::new(ExecutionStore::new()))
}

#[tokio::test]
async fn test_env_file_created_and_updated_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let executor = local_executor();
    let plan = PlanDocument::default();
    let context = ExecutionContext {
        plan: &plan,
        project_root: dir.path(),
    };

    let result = executor.execute_step(0, "Set PORT=4000 in .env.local", &context).await;
    assert!(result.success, "{}", result.message);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".env.local")).unwrap(),
        "PORT=4000\n"
    );

    let result = executor.execute_step(1, "Set PORT=5000 in .env.local", &context).await;
    assert!(result.success, "{}", result.message);
    assert_eq!(
        std::fs::read_to_string(dir.path().join(".env.local")).unwrap(),
        "PORT=5000\n"
    );
}

#[tokio::test]
async fn test_created_files_land_under_project_root() {
    let dir = tempfile::tempdir().unwrap();
    let executor = local_executor();
    let plan = PlanDocument::from_json(
        r#"{"planning": {"codeBlocks": [{"filePath": "src/lib/math.ts", "content": "export const add = (a: number, b: number) => a + b;\r\n"}]}}"#,
    )
    .unwrap();
    let context = ExecutionContext {
        plan: &plan,
        project_root: dir.path(),
    };

    let result = executor
        .execute_step(0, "Create src/lib/math.ts helper", &context)
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("src/lib/math.ts")).unwrap(),
        "export const add = (a: number, b: number) => a + b;\n"
    );
}
