use crate::support::*;
use application::{ExecutionContext, ExecutionStore, PlanExecutor, Services};
use domain::entities::{LogKind, StepStatus};
use domain::models::PlanDocument;
use infrastructure::config::ExecutionConfig;
use std::path::Path;
use std::sync::Arc;

const PLAN: &str = r#"{
  "metadata": {
    "userRequest": "Add a header, footer and nav to the landing page",
    "createdAt": "2024-05-01T10:00:00Z",
    "projectPath": "/tmp/landing"
  },
  "planning": {
    "analysis": "Next.js app router project",
    "questions": [],
    "isClear": true,
    "readyToExecute": true,
    "plan": {
      "actionType": "mixed",
      "packages": ["react-icons"],
      "filesToCreate": [
        { "path": "src/components/Header.tsx", "reason": "site header", "fileExists": false },
        { "path": "src/components/Footer.tsx", "reason": "site footer", "fileExists": false },
        { "path": "src/components/Nav.tsx", "reason": "navigation", "purpose": "Top navigation", "fileExists": false }
      ],
      "filesToModify": [
        { "path": "src/app/page.tsx", "reason": "use the new components", "fileExists": true }
      ],
      "executionOrder": [
        "패키지 설치 (react-icons, axios)",
        "Create components (Header.tsx, Footer.tsx, Nav.tsx)",
        "page.tsx 수정",
        "개발 서버 실행 (npm run dev)"
      ]
    },
    "tasks": [
      { "type": "create", "target": "src/components/Header.tsx", "content": "task header" },
      { "type": "create", "target": "src/components/Footer.tsx", "content": "export const Footer = () => <footer />;" },
      { "type": "command", "description": "Lint the sources", "command": "npm run lint" }
    ],
    "codeBlocks": [
      { "filePath": "src/components/Header.tsx", "language": "tsx", "content": "export const Header = () => <header />;" },
      { "filePath": "src/app/page.tsx", "language": "tsx", "content": "ok" }
    ]
  }
}"#;

fn plan() -> PlanDocument {
    PlanDocument::from_json(PLAN).unwrap()
}

fn context(plan: &PlanDocument) -> ExecutionContext<'_> {
    ExecutionContext {
        plan,
        project_root: Path::new("/tmp/landing"),
    }
}

#[tokio::test]
async fn test_parenthetical_list_writes_each_file_with_content_precedence() {
    let fs = Arc::new(MemoryFileSystem::new());
    let checker = Arc::new(RecordingChecker::default());
    let services = Services::new(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()))
        .with_error_checker(checker.clone());
    let executor = executor_with(services);
    let plan = plan();

    let result = executor
        .execute_step(1, "Create components (Header.tsx, Footer.tsx, Nav.tsx)", &context(&plan))
        .await;

    assert!(result.success, "{}", result.message);
    assert!(result.message.starts_with("Created 3/3"));
    assert_eq!(
        fs.written_paths(),
        vec![
            "src/components/Header.tsx",
            "src/components/Footer.tsx",
            "src/components/Nav.tsx"
        ]
    );

    // code block beats task, task beats template
    assert_eq!(
        fs.file("src/components/Header.tsx").as_deref(),
        Some("export const Header = () => <header />;")
    );
    assert_eq!(
        fs.file("src/components/Footer.tsx").as_deref(),
        Some("export const Footer = () => <footer />;")
    );
    let nav = fs.file("src/components/Nav.tsx").unwrap();
    assert!(nav.starts_with("// Top navigation"));
    assert!(nav.contains("export default function Nav()"));

    assert_eq!(checker.checked().len(), 3);

    let logs = executor.store().logs(1);
    assert!(logs.iter().any(|l| l.message.contains("codeBlocks[0]")));
    assert!(logs.iter().any(|l| l.message.contains("tasks[1]")));
    assert!(logs.iter().any(|l| l.kind == LogKind::Warning && l.message.contains("template")));
}

#[tokio::test]
async fn test_write_failure_does_not_abort_siblings() {
    let fs = Arc::new(MemoryFileSystem::new().failing_on("src/components/Footer.tsx"));
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor
        .execute_step(1, "Create components (Header.tsx, Footer.tsx, Nav.tsx)", &context(&plan))
        .await;

    assert!(!result.success);
    assert_eq!(fs.writes().len(), 3);
    assert!(result.message.contains("✗ src/components/Footer.tsx"));
    assert!(result.message.contains("✓ src/components/Nav.tsx"));
    assert_eq!(executor.store().status(1), StepStatus::Failed);
}

#[tokio::test]
async fn test_reexecution_only_grows_the_log() {
    let fs = Arc::new(MemoryFileSystem::new());
    let executor = executor(fs, Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));
    let plan = plan();
    let step = "Create components (Header.tsx, Footer.tsx, Nav.tsx)";

    executor.execute_step(1, step, &context(&plan)).await;
    let first = executor.store().logs(1);

    executor.execute_step(1, step, &context(&plan)).await;
    let second = executor.store().logs(1);

    assert!(second.len() > first.len());
    assert_eq!(&second[..first.len()], &first[..]);
    assert_eq!(executor.store().record(1).unwrap().executions, 2);
    assert_eq!(executor.store().status(1), StepStatus::Succeeded);
}

#[tokio::test]
async fn test_install_scenario() {
    let shell = Arc::new(ScriptedShell::new());
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor
        .execute_step(0, "패키지 설치 (react-icons, axios)", &context(&plan))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(shell.calls(), vec!["npm install react-icons axios"]);
}

#[tokio::test]
async fn test_modify_with_short_content_fails_without_writing() {
    let fs = Arc::new(MemoryFileSystem::new());
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor.execute_step(2, "page.tsx 수정", &context(&plan)).await;

    assert!(!result.success);
    assert!(result.message.contains("No modification content found"));
    assert!(fs.writes().is_empty());
}

#[tokio::test]
async fn test_modify_writes_resolved_content() {
    let mut plan = plan();
    plan.planning.code_blocks[1].content = Some("export default function Page() { return <main />; }".to_string());
    let fs = Arc::new(MemoryFileSystem::new());
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));

    let result = executor.execute_step(2, "page.tsx 수정", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(fs.written_paths(), vec!["src/app/page.tsx"]);
}

#[tokio::test]
async fn test_unclassifiable_step_fails() {
    let executor = executor(
        Arc::new(MemoryFileSystem::new()),
        Arc::new(ScriptedShell::new()),
        Arc::new(ScriptedChat::new()),
    );
    let plan = plan();

    let result = executor.execute_step(7, "Celebrate", &context(&plan)).await;

    assert!(!result.success);
    assert!(result.message.starts_with("Cannot execute step"));
    assert_eq!(executor.store().status(7), StepStatus::Failed);
}

#[tokio::test]
async fn test_command_without_any_command_fails() {
    let shell = Arc::new(ScriptedShell::new());
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor.execute_step(0, "Run it", &context(&plan)).await;

    assert!(!result.success);
    assert_eq!(result.message, "No executable command found");
    assert!(shell.calls().is_empty());
}

#[tokio::test]
async fn test_command_output_is_mirrored_to_terminal() {
    let shell = Arc::new(ScriptedShell::new().script("npm run build", vec![ok_output("compiled\n")]));
    let terminal = Arc::new(RecordingTerminal::default());
    let services = Services::new(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()))
        .with_terminal(terminal.clone());
    let executor = executor_with(services);
    let plan = plan();

    let result = executor.execute_step(0, "프로젝트 빌드", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(shell.calls(), vec!["npm run build"]);
    let lines = terminal.lines();
    assert!(lines.contains(&("$ npm run build\n".to_string(), false)));
    assert!(lines.contains(&("compiled\n".to_string(), false)));
}

#[tokio::test]
async fn test_task_execution_runs_task_command() {
    let shell = Arc::new(ScriptedShell::new());
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor.execute_step(0, "Lint the sources", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(shell.calls(), vec!["npm run lint"]);
}

#[tokio::test]
async fn test_environment_variable_is_appended() {
    let fs = Arc::new(MemoryFileSystem::new().with_file(".env", "HOST=localhost\n"));
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor
        .execute_step(0, "Add API_URL=http://localhost:8080 to .env", &context(&plan))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        fs.file(".env").as_deref(),
        Some("HOST=localhost\nAPI_URL=http://localhost:8080\n")
    );
}

#[tokio::test]
async fn test_config_file_gets_a_skeleton() {
    let fs = Arc::new(MemoryFileSystem::new());
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor.execute_step(0, "tsconfig 설정 파일 추가", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(fs.file("tsconfig.json").as_deref(), Some("{}\n"));
}

#[tokio::test]
async fn test_existing_config_file_is_left_alone() {
    let fs = Arc::new(MemoryFileSystem::new().with_file("tsconfig.json", "{ \"strict\": true }"));
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let result = executor.execute_step(0, "tsconfig 설정 파일 추가", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert!(fs.writes().is_empty());
}

#[tokio::test]
async fn test_analysis_is_stored_not_written() {
    let fs = Arc::new(MemoryFileSystem::new().with_file("package.json", "{\"name\":\"landing\"}"));
    let chat = Arc::new(ScriptedChat::new().reply("A Next.js landing page with three components."));
    let executor = executor(fs.clone(), Arc::new(ScriptedShell::new()), chat.clone());
    let plan = plan();

    let result = executor.execute_step(4, "프로젝트 구조 분석", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        executor.store().analysis(4).as_deref(),
        Some("A Next.js landing page with three components.")
    );
    assert!(fs.writes().is_empty());
    let prompt = &chat.prompts()[0];
    assert!(prompt.contains("{\"name\":\"landing\"}"));
    assert!(prompt.contains("Add a header, footer and nav"));
}

#[tokio::test]
async fn test_analysis_continues_when_listing_times_out() {
    let fs = Arc::new(
        MemoryFileSystem::new()
            .with_file("package.json", "{\"name\":\"landing\"}")
            .with_stalled_listing(),
    );
    let chat = Arc::new(ScriptedChat::new().reply("Landing page project."));
    let config = ExecutionConfig {
        path_discovery_timeout_ms: 50,
        ..ExecutionConfig::without_delays()
    };
    let executor = PlanExecutor::new(
        Services::new(fs.clone(), Arc::new(ScriptedShell::new()), chat.clone()),
        config,
        Arc::new(ExecutionStore::new()),
    );
    let plan = plan();

    let result = executor.execute_step(4, "프로젝트 구조 분석", &context(&plan)).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(executor.store().analysis(4).as_deref(), Some("Landing page project."));
    let logs = executor.store().logs(4);
    assert!(logs
        .iter()
        .any(|l| l.kind == LogKind::Warning && l.message.contains("took longer than")));
    let prompt = &chat.prompts()[0];
    assert!(prompt.contains("## Project files\n(unavailable)"));
    assert!(prompt.contains("{\"name\":\"landing\"}"));
}

#[tokio::test]
async fn test_empty_analysis_fails() {
    let chat = Arc::new(ScriptedChat::new().reply("   "));
    let executor = executor(Arc::new(MemoryFileSystem::new()), Arc::new(ScriptedShell::new()), chat);
    let plan = plan();

    let result = executor.execute_step(4, "Summarize the codebase", &context(&plan)).await;

    assert!(!result.success);
    assert!(executor.store().analysis(4).is_none());
}

#[tokio::test]
async fn test_execute_all_stops_at_first_failure() {
    let shell = Arc::new(
        ScriptedShell::new().script("npm install react-icons axios", vec![failed_output("npm ERR! network")]),
    );
    let fs = Arc::new(MemoryFileSystem::new());
    let executor = executor(fs.clone(), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = plan();

    let results = executor.execute_all(&context(&plan), false).await;
    assert_eq!(results.len(), 1);
    assert!(!results[0].1.success);
    assert!(fs.writes().is_empty());

    let results = executor.execute_all(&context(&plan), true).await;
    assert_eq!(results.len(), 4);
}
