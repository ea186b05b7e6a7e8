use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use chainrun_core::error::{ChainError, Result};
use chainrun_core::traits::TextGenerator;

use crate::graph::{Node, NodeKind};

/// One handler per node kind.
///
/// Each handler takes the current value (`Null` before the first node) and
/// returns the value handed to the next node.
pub struct NodeExecutors {
    generator: Arc<dyn TextGenerator>,
    generation_timeout: Duration,
}

impl NodeExecutors {
    pub fn new(generator: Arc<dyn TextGenerator>, generation_timeout: Duration) -> Self {
        Self {
            generator,
            generation_timeout,
        }
    }

    /// Dispatch `node` to its handler.
    pub async fn execute(&self, node: &Node, input: Value) -> Result<Value> {
        match &node.kind {
            NodeKind::TextInput { text } => Ok(text_input(text)),
            NodeKind::GeminiPrompt => self.gemini_prompt(&node.id, input).await,
            NodeKind::Output => Ok(input),
            NodeKind::Unrecognized { type_name } => {
                warn!(node_id = %node.id, node_type = %type_name, "Unknown node type, passing value through");
                Ok(input)
            }
        }
    }

    async fn gemini_prompt(&self, node_id: &str, input: Value) -> Result<Value> {
        let prompt = match input {
            Value::String(s) if !s.is_empty() => s,
            other => {
                return Err(ChainError::InvalidNodeInput {
                    node_id: node_id.to_string(),
                    message: format!(
                        "prompt input must be a non-empty string, got {}",
                        describe(&other)
                    ),
                })
            }
        };

        debug!(
            node_id,
            generator = self.generator.name(),
            prompt_chars = prompt.chars().count(),
            "Calling text generator"
        );

        let response = tokio::time::timeout(self.generation_timeout, self.generator.generate(prompt))
            .await
            .map_err(|_| ChainError::GenerationTimeout(self.generation_timeout.as_secs()))??;

        info!(node_id, response_chars = response.chars().count(), "Prompt node answered");
        Ok(Value::String(response))
    }
}

fn text_input(text: &str) -> Value {
    Value::String(text.to_string())
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "nothing".to_string(),
        Value::String(_) => "an empty string".to_string(),
        other => other.to_string(),
    }
}
