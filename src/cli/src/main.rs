use application::{create_plan_executor, ExecutionContext, StepClassifier};
use clap::{Parser, Subcommand};
use colored::Colorize;
use domain::entities::{ExecutionLogEntry, LogKind, StepResult};
use domain::models::PlanDocument;
use domain::services::TerminalSink;
use infrastructure::config::Config;
use infrastructure::observability::init_tracing;
use infrastructure::{ConsoleTerminal, ProcessRegistry};
use shared::types::Result;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "planexec")]
#[command(about = "Apply an LLM-generated coding plan to a local project")]
#[command(version)]
struct Cli {
    #[arg(long, global = true, default_value = "info", help = "Log level when RUST_LOG is not set")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one step, or every step in order
    Run {
        #[arg(long, help = "Plan document (JSON)")]
        plan: PathBuf,

        #[arg(long, help = "Zero-based step index to execute; all steps when omitted")]
        step: Option<usize>,

        #[arg(long, help = "Project root; defaults to the plan's projectPath, then the current directory")]
        project: Option<PathBuf>,

        #[arg(long, help = "Configuration file (toml, yaml or json)")]
        config: Option<PathBuf>,

        #[arg(long, help = "Continue with the next step after a failure")]
        keep_going: bool,

        #[arg(long, help = "Stop dev servers started by this run before exiting")]
        stop_servers: bool,
    },
    /// Print the action kind each step is classified as
    Classify {
        #[arg(long, help = "Plan document (JSON)")]
        plan: PathBuf,
    },
}

fn project_root(explicit: Option<PathBuf>, plan: &PlanDocument) -> PathBuf {
    explicit
        .or_else(|| {
            let from_plan = plan.metadata.project_path.trim();
            (!from_plan.is_empty()).then(|| PathBuf::from(from_plan))
        })
        .unwrap_or_else(|| PathBuf::from("."))
}

fn load_config(explicit: Option<&Path>, project_root: &Path) -> Result<Config> {
    match explicit {
        Some(path) => {
            let mut config = Config::load_from_file(path)?;
            config.apply_env_overrides();
            Ok(config)
        }
        None => Ok(Config::load(Some(project_root))),
    }
}

fn print_log_entry(entry: &ExecutionLogEntry) {
    let time = entry.timestamp.format("%H:%M:%S").to_string();
    let kind = match entry.kind {
        LogKind::Success => entry.kind.to_string().green(),
        LogKind::Error => entry.kind.to_string().red(),
        LogKind::Warning => entry.kind.to_string().yellow(),
        LogKind::Command => entry.kind.to_string().cyan(),
        LogKind::File => entry.kind.to_string().blue(),
        LogKind::Info => entry.kind.to_string().normal(),
    };
    println!("  {} [{}] {}", time.dimmed(), kind, entry.message);
    if let Some(details) = &entry.details {
        for line in details.lines().take(20) {
            println!("      {}", line.dimmed());
        }
    }
}

fn print_result(index: usize, description: &str, result: &StepResult) {
    let status = if result.success {
        "✓ succeeded".green().bold()
    } else {
        "✗ failed".red().bold()
    };
    println!("\n{} {} {}", format!("Step {}:", index + 1).bold(), description, status);
    for line in result.message.lines() {
        println!("  {}", line);
    }
}

async fn run(
    plan_path: PathBuf,
    step: Option<usize>,
    project: Option<PathBuf>,
    config_path: Option<PathBuf>,
    keep_going: bool,
    stop_servers: bool,
) -> Result<bool> {
    let plan = PlanDocument::load(&plan_path)?;
    let root = project_root(project, &plan);
    let config = load_config(config_path.as_deref(), &root)?;
    tracing::info!(
        "Loaded plan {} with {} step(s), project root {}",
        plan_path.display(),
        plan.steps().len(),
        root.display()
    );

    let registry = Arc::new(ProcessRegistry::new());
    let terminal: Arc<dyn TerminalSink> = Arc::new(ConsoleTerminal::with_prefix("│"));
    let executor = create_plan_executor(&config, registry.clone(), Some(terminal))?;
    let context = ExecutionContext {
        plan: &plan,
        project_root: &root,
    };

    let results = match step {
        Some(index) => {
            let Some(description) = plan.steps().get(index) else {
                anyhow::bail!("plan has {} step(s), no step {}", plan.steps().len(), index);
            };
            vec![(index, executor.execute_step(index, description, &context).await)]
        }
        None => executor.execute_all(&context, keep_going).await,
    };

    for (index, result) in &results {
        let description = plan.steps().get(*index).map(String::as_str).unwrap_or("");
        print_result(*index, description, result);
        for entry in executor.store().logs(*index) {
            print_log_entry(&entry);
        }
    }

    let running = registry.list();
    if stop_servers {
        let stopped = registry.stop_all();
        if stopped > 0 {
            println!("\nStopped {} background process(es)", stopped);
        }
    } else {
        for process in running {
            println!(
                "\n{} {} (pid {})",
                "Still running:".yellow(),
                process.command,
                process.pid
            );
        }
    }

    Ok(results.iter().all(|(_, result)| result.success))
}

fn classify(plan_path: PathBuf) -> Result<bool> {
    let plan = PlanDocument::load(&plan_path)?;
    let classifier = StepClassifier::default();
    let mut all_classified = true;

    for (index, description) in plan.steps().iter().enumerate() {
        match classifier.matching_rule(description, &plan) {
            Some(rule) => println!(
                "{:>3}. {:<22} {}",
                index + 1,
                rule.kind.to_string().cyan(),
                description
            ),
            None => {
                all_classified = false;
                println!("{:>3}. {:<22} {}", index + 1, "unclassified".red(), description);
            }
        }
    }
    Ok(all_classified)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let outcome = match cli.command {
        Commands::Run {
            plan,
            step,
            project,
            config,
            keep_going,
            stop_servers,
        } => run(plan, step, project, config, keep_going, stop_servers).await,
        Commands::Classify { plan } => classify(plan),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
