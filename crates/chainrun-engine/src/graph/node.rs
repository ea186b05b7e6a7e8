use chainrun_core::error::{ChainError, Result};
use chainrun_core::types::NodeSpec;

/// What a node does, with the data its executor needs.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Emits `text`, ignoring its input.
    TextInput { text: String },
    /// Sends its input to the text generator.
    GeminiPrompt,
    /// Passes its input through; marks the end of the chain.
    Output,
    /// Any other tag. Passes its input through with a warning.
    Unrecognized { type_name: String },
}

impl NodeKind {
    /// Build a typed kind from a persisted node.
    ///
    /// Accepts the canonical tags and the camelCase tags written by the editor.
    pub fn from_spec(spec: &NodeSpec) -> Result<Self> {
        match spec.node_type.as_str() {
            "text_input" | "textInput" => {
                let text = match spec.data.get("text") {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => {
                        return Err(ChainError::InvalidNodeData {
                            node_id: spec.id.clone(),
                            message: format!("`text` must be a string, got {}", other),
                        })
                    }
                };
                Ok(NodeKind::TextInput { text })
            }
            "gemini_prompt" | "geminiPrompt" => Ok(NodeKind::GeminiPrompt),
            "output" | "textOutput" => Ok(NodeKind::Output),
            other => Ok(NodeKind::Unrecognized {
                type_name: other.to_string(),
            }),
        }
    }

    /// Tag used in logs.
    pub fn label(&self) -> &str {
        match self {
            NodeKind::TextInput { .. } => "text_input",
            NodeKind::GeminiPrompt => "gemini_prompt",
            NodeKind::Output => "output",
            NodeKind::Unrecognized { type_name } => type_name,
        }
    }
}

/// A validated node in a loaded graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn from_spec(spec: &NodeSpec) -> Result<Self> {
        Ok(Self {
            id: spec.id.clone(),
            kind: NodeKind::from_spec(spec)?,
        })
    }
}
