use std::io::Write;

use chainrun_core::config::AppConfig;
use chainrun_core::error::ChainError;
use chainrun_core::types::UserId;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
[database]
path = "/tmp/chainrun-test/runs.db"

[generation]
provider = "gemini"
model_id = "gemini-1.5-pro"
api_key = "AIza-test-key"
base_url = "http://127.0.0.1:9000"
max_tokens = 512
temperature = 0.4
timeout_secs = 15

[gateway]
bind = "0.0.0.0:9999"

[[gateway.api_keys]]
name = "ci"
key = "ck_ci_key"
user_id = 3

[runner]
queue_capacity = 8
workers = 4
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.database_path().to_str(), Some("/tmp/chainrun-test/runs.db"));
    assert_eq!(config.generation.model_id, "gemini-1.5-pro");
    assert_eq!(config.generation.api_key.as_deref(), Some("AIza-test-key"));
    assert_eq!(config.generation.base_url.as_deref(), Some("http://127.0.0.1:9000"));
    assert_eq!(config.generation.max_tokens, 512);
    assert_eq!(config.generation.timeout_secs, 15);

    assert_eq!(config.gateway.bind, "0.0.0.0:9999");
    assert_eq!(config.gateway.api_keys.len(), 1);
    assert_eq!(config.gateway.api_keys[0].name, "ci");
    assert_eq!(config.gateway.api_keys[0].user_id, UserId(3));

    assert_eq!(config.runner.queue_capacity, 8);
    assert_eq!(config.runner.workers, 4);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("CHAINRUN_TEST_API_KEY", "expanded-key-value");

    let toml_content = r#"
[generation]
api_key = "${CHAINRUN_TEST_API_KEY}"
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");
    assert_eq!(
        config.generation.api_key,
        Some("expanded-key-value".to_string())
    );

    std::env::remove_var("CHAINRUN_TEST_API_KEY");
}

#[test]
fn test_minimal_config_uses_defaults() {
    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(b"[generation]\n").expect("write toml");

    let config = AppConfig::load(tmp.path()).expect("load config");

    assert_eq!(config.generation.provider, "gemini");
    assert!(config.generation.api_key.is_none());
    assert_eq!(config.generation.timeout_secs, 60);
    assert_eq!(config.gateway.bind, "127.0.0.1:8000");
    assert!(config.gateway.api_keys.is_empty());
    assert_eq!(config.runner.workers, 2);
    assert_eq!(config.runner.queue_capacity, 64);
}

#[test]
fn test_missing_file_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = AppConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ChainError::ConfigNotFound(_)));
}

#[test]
fn test_invalid_runner_settings_are_rejected() {
    let toml_content = r#"
[generation]

[runner]
queue_capacity = 0
"#;

    let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
    tmp.write_all(toml_content.as_bytes()).expect("write toml");

    let err = AppConfig::load(tmp.path()).unwrap_err();
    assert!(err.to_string().contains("queue_capacity"));
}

#[test]
fn test_config_written_to_temp_dir() {
    let (_dir, path) = chainrun_test_utils::fixtures::write_config(
        "[generation]\nprovider = \"echo\"\n\n[database]\npath = \"runs.db\"\n",
    );
    let config = AppConfig::load(&path).expect("load config");
    assert_eq!(config.generation.provider, "echo");
    assert_eq!(config.database_path().to_str(), Some("runs.db"));
}
