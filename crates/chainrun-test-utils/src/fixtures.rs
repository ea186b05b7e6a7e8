use std::path::PathBuf;

use tempfile::TempDir;

use chainrun_core::config::AppConfig;
use chainrun_core::types::{EdgeSpec, NodeSpec, WorkflowDraft};

/// `a` (text "hello") -> `b` (prompt) -> `c` (output).
pub fn hello_chain() -> WorkflowDraft {
    WorkflowDraft::new(
        "hello chain",
        vec![
            NodeSpec::text_input("a", "hello").with_position(0.0, 0.0),
            NodeSpec::gemini_prompt("b").with_position(200.0, 0.0),
            NodeSpec::output("c").with_position(400.0, 0.0),
        ],
        vec![EdgeSpec::new("a", "b"), EdgeSpec::new("b", "c")],
    )
}

/// A config using the echo generator and an in-memory-friendly runner.
pub fn test_config() -> AppConfig {
    toml::from_str(
        r#"
[generation]
provider = "echo"
timeout_secs = 5

[[gateway.api_keys]]
name = "test"
key = "ck_test"
user_id = 1
"#,
    )
    .expect("fixture config parses")
}

/// Write `content` to `chainrun.toml` in a fresh temp dir.
pub fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("chainrun.toml");
    std::fs::write(&path, content).expect("write config");
    (dir, path)
}

/// Editor-style JSON for [`hello_chain`].
pub fn hello_chain_json() -> serde_json::Value {
    serde_json::to_value(hello_chain()).expect("draft serializes")
}
