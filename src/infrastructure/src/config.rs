use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub execution: ExecutionConfig,
    pub shell: ShellConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Pacing and limits for step execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub file_write_delay_ms: u64,
    pub command_delay_ms: u64,
    pub port_release_delay_ms: u64,
    pub fix_delay_ms: u64,
    pub min_modify_content_len: usize,
    pub path_discovery_timeout_ms: u64,
    pub context_file_char_limit: usize,
    pub tree_entry_limit: usize,
    pub tree_max_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub allowed_binaries: Vec<String>,
    /// How long a server-start command may run before it is left in the background.
    pub dev_server_grace_ms: u64,
    pub max_output_bytes: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            model: "default".to_string(),
            api_key: None,
            timeout_secs: 300,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            file_write_delay_ms: 100,
            command_delay_ms: 500,
            port_release_delay_ms: 2000,
            fix_delay_ms: 300,
            min_modify_content_len: 10,
            path_discovery_timeout_ms: 3000,
            context_file_char_limit: 2000,
            tree_entry_limit: 200,
            tree_max_depth: 4,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            allowed_binaries: default_allowed_binaries(),
            dev_server_grace_ms: 5000,
            max_output_bytes: 1_048_576, // 1MB
        }
    }
}

/// Base binaries the shell executor accepts, across several ecosystems.
pub fn default_allowed_binaries() -> Vec<String> {
    [
        // JavaScript / TypeScript
        "npm", "npx", "yarn", "pnpm", "node", "bun", "deno", "tsc", "vite", "next",
        // Python
        "python", "python3", "pip", "pip3", "pytest", "uvicorn", "flask", "poetry",
        // Go / Rust
        "go", "cargo", "rustc",
        // JVM
        "mvn", "gradle", "./gradlew", "gradlew", "java", "javac",
        // Others
        "dotnet", "make", "flutter", "dart", "php", "composer", "ruby", "bundle", "rails",
        // Inspection helpers
        "ls", "cat", "echo", "git",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ExecutionConfig {
    pub fn file_write_delay(&self) -> Duration {
        Duration::from_millis(self.file_write_delay_ms)
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn port_release_delay(&self) -> Duration {
        Duration::from_millis(self.port_release_delay_ms)
    }

    pub fn fix_delay(&self) -> Duration {
        Duration::from_millis(self.fix_delay_ms)
    }

    pub fn path_discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.path_discovery_timeout_ms)
    }

    /// Zero delays, for tests and dry runs.
    pub fn without_delays() -> Self {
        Self {
            file_write_delay_ms: 0,
            command_delay_ms: 0,
            port_release_delay_ms: 0,
            fix_delay_ms: 0,
            ..Self::default()
        }
    }
}

impl Config {
    /// Load a configuration file, picking the format from the extension.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::Configuration(format!("YAML error: {}", e))),
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => {
                // Try to detect format from content
                if content.trim().starts_with('{') {
                    Ok(serde_json::from_str(&content)?)
                } else {
                    Ok(toml::from_str(&content)?)
                }
            }
        }
    }

    /// Configuration file paths to search, highest priority first.
    pub fn get_config_paths(project_root: Option<&Path>) -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Some(root) = project_root {
            for name in [".planexec.toml", ".planexec.yaml", ".planexec.yml", ".planexec.json"] {
                paths.push(root.join(name));
            }
        }

        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        for name in ["config.toml", "config.yaml", "config.json"] {
            paths.push(PathBuf::from(&home).join(".config/planexec").join(name));
        }

        paths
    }

    /// Load configuration with fallback to defaults, then apply environment overrides.
    pub fn load(project_root: Option<&Path>) -> Self {
        let _ = dotenv();

        let mut config = Self::get_config_paths(project_root)
            .into_iter()
            .filter(|path| path.exists())
            .find_map(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default();

        config.apply_env_overrides();
        config
    }

    /// Apply `PLANEXEC_*` environment variables on top of the current values.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("PLANEXEC_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Ok(model) = env::var("PLANEXEC_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(key) = env::var("PLANEXEC_LLM_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(delay) = env::var("PLANEXEC_PORT_RELEASE_DELAY_MS") {
            match delay.parse() {
                Ok(ms) => self.execution.port_release_delay_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid PLANEXEC_PORT_RELEASE_DELAY_MS: {}", delay),
            }
        }
    }
}
