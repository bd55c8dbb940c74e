//! Content block model — the data shape flowing through the engine.

use serde::{Deserialize, Serialize};

/// Parameter map of a tool-use request, as decoded from the model output.
pub type ToolParams = serde_json::Map<String, serde_json::Value>;

/// One unit of an assistant turn: narrative text, or a structured request to
/// run a named capability.
///
/// Blocks are produced by an external decoder and appended to the session
/// buffer. A block with `partial: true` is still being streamed; once a block
/// transitions to `partial: false` it is immutable for the rest of the turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Narrative text presented to the user.
    Text { content: String, partial: bool },
    /// Tool invocation request embedded in the response.
    ToolUse {
        name: String,
        params: ToolParams,
        partial: bool,
    },
}

impl ContentBlock {
    /// Construct a text block.
    pub fn text(content: impl Into<String>, partial: bool) -> Self {
        Self::Text {
            content: content.into(),
            partial,
        }
    }

    /// Construct a tool-use block.
    pub fn tool_use(name: impl Into<String>, params: ToolParams, partial: bool) -> Self {
        Self::ToolUse {
            name: name.into(),
            params,
            partial,
        }
    }

    /// Whether the block is still being streamed.
    pub fn partial(&self) -> bool {
        match self {
            Self::Text { partial, .. } | Self::ToolUse { partial, .. } => *partial,
        }
    }

    /// Whether the block has reached its final form.
    pub fn is_final(&self) -> bool {
        !self.partial()
    }

    pub(crate) fn set_final(&mut self) {
        match self {
            Self::Text { partial, .. } | Self::ToolUse { partial, .. } => *partial = false,
        }
    }
}

/// A piece of content reported back to the model in the next request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultContent {
    Text { text: String },
    Structured { value: serde_json::Value },
}

impl ResultContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn structured(value: serde_json::Value) -> Self {
        Self::Structured { value }
    }
}

impl From<String> for ResultContent {
    fn from(text: String) -> Self {
        Self::Text { text }
    }
}

impl From<&str> for ResultContent {
    fn from(text: &str) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Result of one tool invocation, fed into the next model request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool ran and produced content.
    Accepted { content: Vec<ResultContent> },
    /// The user declined the proposal.
    Denied { feedback: Option<String> },
    /// The call failed; the message doubles as the result text so the model
    /// can react.
    Errored { message: String },
}

/// Raw signature string of a tool call: the serialized parameter map,
/// compared byte-for-byte by the repetition detector.
pub(crate) fn raw_params(params: &ToolParams) -> String {
    serde_json::to_string(params).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finalize_clears_partial_flag() {
        let mut block = ContentBlock::text("hello", true);
        assert!(block.partial());
        block.set_final();
        assert!(block.is_final());
    }

    #[test]
    fn blocks_serialize_with_type_tag() {
        let block = ContentBlock::text("hi", false);
        let value = serde_json::to_value(&block).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["partial"], false);
    }

    #[test]
    fn raw_params_are_deterministic() {
        let mut params = ToolParams::new();
        params.insert("path".into(), json!("a.txt"));
        let a = raw_params(&params);
        let b = raw_params(&params.clone());
        assert_eq!(a, b);
        assert!(a.contains("a.txt"));
    }
}
