use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ChainError, Result};
use crate::types::UserId;

/// Top-level chainrun configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    pub generation: GenerationConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String { "~/.chainrun/chainrun.db".to_string() }

/// Text generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound on a single generation call. Expiry fails the run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String { "gemini".to_string() }
fn default_model_id() -> String { "gemini-2.0-flash-exp".to_string() }
fn default_max_tokens() -> u32 { 2048 }
fn default_temperature() -> f32 { 0.0 }
fn default_timeout_secs() -> u64 { 60 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_keys: vec![],
        }
    }
}

/// A bearer key and the user it acts for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    pub key: String,
    pub user_id: UserId,
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

/// Background run queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            workers: default_workers(),
        }
    }
}

fn default_queue_capacity() -> usize { 64 }
fn default_workers() -> usize { 2 }

impl AppConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ChainError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| ChainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.runner.workers == 0 {
            return Err(ChainError::Config("runner.workers must be at least 1".into()));
        }
        if self.runner.queue_capacity == 0 {
            return Err(ChainError::Config(
                "runner.queue_capacity must be at least 1".into(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(ChainError::Config(
                "generation.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the database path (expand ~).
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.database.path, dirs_home())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.generation.api_key.is_some() {
            copy.generation.api_key = Some("***".to_string());
        }
        for key in &mut copy.gateway.api_keys {
            key.key = "***".to_string();
        }
        copy
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn expand_home(path: &str, home: Option<PathBuf>) -> PathBuf {
    match (path.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("CHAINRUN_EXPAND_ONLY_TEST_VAR", "hello");
        let result = expand_env_vars("key = \"${CHAINRUN_EXPAND_ONLY_TEST_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("CHAINRUN_EXPAND_ONLY_TEST_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_CHAINRUN_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_CHAINRUN_VAR}\"");
    }

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config: AppConfig = toml::from_str("[generation]\n").unwrap();
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.generation.model_id, "gemini-2.0-flash-exp");
        assert!(config.generation.api_key.is_none());
        assert_eq!(config.generation.timeout_secs, 60);
        assert_eq!(config.gateway.bind, "127.0.0.1:8000");
        assert!(config.gateway.api_keys.is_empty());
        assert_eq!(config.runner.workers, 2);
        assert_eq!(config.runner.queue_capacity, 64);
        assert_eq!(config.database.path, "~/.chainrun/chainrun.db");
    }

    #[test]
    fn test_generation_section_required() {
        assert!(toml::from_str::<AppConfig>("[gateway]\nbind = \"0.0.0.0:1\"\n").is_err());
    }

    #[test]
    fn test_database_path_expands_home() {
        let config: AppConfig = toml::from_str("[generation]\n").unwrap();
        assert_eq!(
            expand_home(&config.database.path, Some(PathBuf::from("/home/tester"))),
            PathBuf::from("/home/tester/.chainrun/chainrun.db")
        );
        assert_eq!(
            expand_home("~/runs.db", None),
            PathBuf::from("~/runs.db")
        );
        assert_eq!(
            expand_home("/var/lib/runs.db", Some(PathBuf::from("/home/tester"))),
            PathBuf::from("/var/lib/runs.db")
        );
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let toml_str = r#"
[generation]
api_key = "AIza-secret"

[[gateway.api_keys]]
name = "ci"
key = "ck_secret"
user_id = 7
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        let shown = config.redacted();
        assert_eq!(shown.generation.api_key.as_deref(), Some("***"));
        assert_eq!(shown.gateway.api_keys[0].key, "***");
        assert_eq!(shown.gateway.api_keys[0].user_id, UserId(7));
        assert_eq!(config.gateway.api_keys[0].key, "ck_secret");
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config: AppConfig = toml::from_str("[generation]\n[runner]\nworkers = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ChainError::Config(_))));
    }
}
