use crate::support::*;
use application::ExecutionContext;
use domain::entities::LogKind;
use domain::models::PlanDocument;
use std::path::Path;
use std::sync::Arc;

const PORT_IN_USE: &str = "\x1b[31mError: listen EADDRINUSE: address already in use :::3000\x1b[0m";

const BUILD_OUTPUT: &str = "Failed to compile.\n\
    ./src/app/page.tsx:4:10\n\
    Type error: Cannot find name 'Heder'.\n\
    ./src/components/Header.tsx:1:1: SyntaxError: Unexpected token\n\
    ./src/app/page.tsx:9:3\n\
    Type error: Property 'title' is missing.\n";

fn context(plan: &PlanDocument) -> ExecutionContext<'_> {
    ExecutionContext {
        plan,
        project_root: Path::new("/tmp/project"),
    }
}

#[tokio::test]
async fn test_port_conflict_kills_once_and_retries_once() {
    let shell = Arc::new(
        ScriptedShell::new()
            .script("npm run dev", vec![failed_output(PORT_IN_USE), ok_output("ready on 3000")]),
    );
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = PlanDocument::default();

    let result = executor
        .execute_step(0, "개발 서버 실행 (npm run dev)", &context(&plan))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        shell.calls(),
        vec!["npm run dev", "kill-port-process 3000", "npm run dev"]
    );
}

#[tokio::test]
async fn test_port_conflict_ignores_timestamps_in_server_output() {
    let vite = "12:30:45 PM [vite] error when starting dev server:\n\
                Error: listen EADDRINUSE: address already in use 127.0.0.1:5173";
    let shell = Arc::new(
        ScriptedShell::new().script("npm run dev", vec![failed_output(vite), ok_output("ready")]),
    );
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = PlanDocument::default();

    let result = executor
        .execute_step(0, "개발 서버 실행 (npm run dev)", &context(&plan))
        .await;

    assert!(result.success, "{}", result.message);
    assert_eq!(
        shell.calls(),
        vec!["npm run dev", "kill-port-process 5173", "npm run dev"]
    );
}

#[tokio::test]
async fn test_port_conflict_retries_even_when_kill_fails() {
    let shell = Arc::new(
        ScriptedShell::new()
            .script("npm run dev", vec![failed_output(PORT_IN_USE), failed_output(PORT_IN_USE)])
            .script("kill-port-process 3000", vec![failed_output("No process is listening on port 3000")]),
    );
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = PlanDocument::default();

    let result = executor
        .execute_step(0, "Start the dev server with `npm run dev`", &context(&plan))
        .await;

    assert!(!result.success);
    assert_eq!(shell.count("kill-port-process 3000"), 1);
    assert_eq!(shell.count("npm run dev"), 2);
    assert!(result.message.contains("recovery failed"));

    let logs = executor.store().logs(0);
    assert!(logs
        .iter()
        .any(|l| l.kind == LogKind::Warning && l.message.contains("Could not free port 3000")));
}

#[tokio::test]
async fn test_port_conflict_on_non_server_command_is_not_recovered() {
    let shell = Arc::new(ScriptedShell::new().script("npm test", vec![failed_output(PORT_IN_USE)]));
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = PlanDocument::default();

    let result = executor.execute_step(0, "테스트 실행 (npm test)", &context(&plan)).await;

    assert!(!result.success);
    assert_eq!(shell.calls(), vec!["npm test"]);
}

#[tokio::test]
async fn test_build_error_fixes_each_file_once_then_retries_once() {
    let fs = Arc::new(
        MemoryFileSystem::new()
            .with_file("src/app/page.tsx", "import { Heder } from '../components/Header';\n")
            .with_file("src/components/Header.tsx", "export const Header = () => <header />;\n"),
    );
    let chat = Arc::new(
        ScriptedChat::new()
            .reply("{\"content\": \"import { Header } from '../components/Header';\\n\"}")
            // identical to the current file, so nothing is written
            .reply("```tsx\nexport const Header = () => <header />;\n```"),
    );
    let shell = Arc::new(
        ScriptedShell::new().script("npm run build", vec![failed_output(BUILD_OUTPUT), ok_output("Compiled")]),
    );
    let executor = executor(fs.clone(), shell.clone(), chat.clone());
    let plan = PlanDocument::default();

    let result = executor
        .execute_step(0, "프로젝트 빌드 (npm run build)", &context(&plan))
        .await;

    assert!(result.success, "{}", result.message);
    assert!(result.message.contains("(recovered)"));
    assert_eq!(shell.count("npm run build"), 2);
    assert_eq!(fs.reads(), vec!["src/app/page.tsx", "src/components/Header.tsx"]);
    assert_eq!(chat.prompts().len(), 2);
    assert!(chat.prompts()[0].contains("line 4, column 10: Type error: Cannot find name 'Heder'."));
    assert!(chat.prompts()[0].contains("line 9, column 3"));
    assert_eq!(fs.written_paths(), vec!["src/app/page.tsx"]);
    assert_eq!(
        fs.file("src/app/page.tsx").as_deref(),
        Some("import { Header } from '../components/Header';\n")
    );
}

#[tokio::test]
async fn test_build_error_retry_failure_is_reported() {
    let fs = Arc::new(MemoryFileSystem::new().with_file("src/app/page.tsx", "broken"));
    let chat = Arc::new(ScriptedChat::new().reply("{\"fixedCode\": \"still broken\"}").reply(""));
    let shell = Arc::new(ScriptedShell::new().script(
        "npm run build",
        vec![failed_output(BUILD_OUTPUT), failed_output(BUILD_OUTPUT)],
    ));
    let executor = executor(fs.clone(), shell.clone(), chat);
    let plan = PlanDocument::default();

    let result = executor.execute_step(0, "Build it (npm run build)", &context(&plan)).await;

    assert!(!result.success);
    assert_eq!(shell.count("npm run build"), 2);
    assert_eq!(fs.written_paths(), vec!["src/app/page.tsx"]);
}

#[tokio::test]
async fn test_each_command_is_recovered_at_most_once_per_step() {
    let shell = Arc::new(ScriptedShell::new().script(
        "npm run dev",
        vec![
            failed_output(PORT_IN_USE),
            failed_output(PORT_IN_USE),
            failed_output(PORT_IN_USE),
        ],
    ));
    let executor = executor(Arc::new(MemoryFileSystem::new()), shell.clone(), Arc::new(ScriptedChat::new()));
    let plan = PlanDocument::default();

    let result = executor
        .execute_step(0, "Restart the server (npm run dev, npm run dev)", &context(&plan))
        .await;

    // duplicate commands collapse to one, so only one recovery cycle runs
    assert!(!result.success);
    assert_eq!(shell.count("kill-port-process 3000"), 1);
    assert_eq!(shell.count("npm run dev"), 2);
}
