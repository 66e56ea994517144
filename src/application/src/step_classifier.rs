//! Keyword classification of plan steps into action kinds.
//!
//! Rules are evaluated in order and the first match wins. A step that mentions
//! several kinds ("create and install") is classified by the earliest rule.

use crate::resolution::commands::mentions_ecosystem_command;
use crate::resolution::targets::find_task_for_step;
use domain::models::PlanDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Install,
    Create,
    Modify,
    Command,
    TaskExecution,
    EnvironmentVariable,
    ConfigFile,
    Information,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionKind::Install => "install",
            ActionKind::Create => "create",
            ActionKind::Modify => "modify",
            ActionKind::Command => "command",
            ActionKind::TaskExecution => "task",
            ActionKind::EnvironmentVariable => "environment variable",
            ActionKind::ConfigFile => "config file",
            ActionKind::Information => "information",
        };
        write!(f, "{}", label)
    }
}

pub type RulePredicate = fn(&str, &PlanDocument) -> bool;

#[derive(Clone)]
pub struct ClassifierRule {
    pub kind: ActionKind,
    pub name: &'static str,
    pub predicate: RulePredicate,
}

impl fmt::Debug for ClassifierRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierRule")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish()
    }
}

static INSTALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)install|설치|dependenc|의존성|\bpackages?(?:\s|$|[,)!:])|패키지")
        .expect("install pattern is valid")
});

static CREATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)create|generate|add\s+new|생성|만들").expect("create pattern is valid")
});

static MODIFY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)modify|update|edit|change|수정|변경|업데이트").expect("modify pattern is valid")
});

static COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:run|build|test|restart|start|compile|serve|server|launch)\b|실행|빌드|테스트|재시작|시작|서버|구동")
        .expect("command pattern is valid")
});

static ENVIRONMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.env\b|환경\s*변수|environment\s+variable").expect("environment pattern is valid")
});

static CONFIG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bconfig|설정\s*파일|구성\s*파일|tsconfig|\.eslintrc|\.prettierrc|\.babelrc|\.editorconfig|\bsettings\.(?:json|py)\b")
        .expect("config pattern is valid")
});

static INFORMATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)analy|summar|review|explain|분석|요약|검토|설명").expect("information pattern is valid")
});

fn is_install(text: &str, _plan: &PlanDocument) -> bool {
    INSTALL.is_match(text)
}

fn is_create(text: &str, _plan: &PlanDocument) -> bool {
    CREATE.is_match(text)
}

fn is_modify(text: &str, _plan: &PlanDocument) -> bool {
    MODIFY.is_match(text)
}

fn is_command(text: &str, _plan: &PlanDocument) -> bool {
    COMMAND.is_match(text) || mentions_ecosystem_command(text)
}

fn is_planned_task(text: &str, plan: &PlanDocument) -> bool {
    find_task_for_step(text, plan).is_some()
}

fn is_environment(text: &str, _plan: &PlanDocument) -> bool {
    ENVIRONMENT.is_match(text)
}

fn is_config(text: &str, _plan: &PlanDocument) -> bool {
    CONFIG.is_match(text)
}

fn is_information(text: &str, _plan: &PlanDocument) -> bool {
    INFORMATION.is_match(text)
}

/// Ordered rule list; the first matching rule decides the kind.
#[derive(Debug, Clone)]
pub struct StepClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for StepClassifier {
    fn default() -> Self {
        Self::new(vec![
            ClassifierRule { kind: ActionKind::Install, name: "install keywords", predicate: is_install },
            ClassifierRule { kind: ActionKind::Create, name: "create keywords", predicate: is_create },
            ClassifierRule { kind: ActionKind::Modify, name: "modify keywords", predicate: is_modify },
            ClassifierRule { kind: ActionKind::Command, name: "command keywords", predicate: is_command },
            ClassifierRule { kind: ActionKind::TaskExecution, name: "planned task", predicate: is_planned_task },
            ClassifierRule { kind: ActionKind::EnvironmentVariable, name: "environment variable", predicate: is_environment },
            ClassifierRule { kind: ActionKind::ConfigFile, name: "config file", predicate: is_config },
            ClassifierRule { kind: ActionKind::Information, name: "analysis request", predicate: is_information },
        ])
    }
}

impl StepClassifier {
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// First rule matching the step text.
    pub fn matching_rule(&self, description: &str, plan: &PlanDocument) -> Option<&ClassifierRule> {
        self.rules.iter().find(|rule| (rule.predicate)(description, plan))
    }

    pub fn classify(&self, description: &str, plan: &PlanDocument) -> Option<ActionKind> {
        self.matching_rule(description, plan).map(|rule| rule.kind)
    }
}
