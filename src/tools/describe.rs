//! Human-readable labels for tool proposals and previews.

use serde_json::Value;

use super::registry::ToolRegistry;
use crate::block::ToolParams;

/// Parameter keys that identify what a call operates on, in preference order.
const PRIMARY_KEYS: &[&str] = &["path", "file", "command", "query", "q", "url", "pattern"];

const MAX_VALUE_LEN: usize = 64;

/// Produce a short label for a tool call, e.g. `[read_file] src/main.rs`.
///
/// Known parameter shapes yield a specific label; otherwise the registry
/// description is used, and unknown tools fall back to the generic `[name]`.
pub fn describe_tool_use(name: &str, params: &ToolParams, registry: &ToolRegistry) -> String {
    if let Some(value) = primary_param(params) {
        return format!("[{name}] {value}");
    }
    if let Some(tool) = registry.lookup(name) {
        return format!("[{name}] {}", tool.description());
    }
    format!("[{name}]")
}

fn primary_param(params: &ToolParams) -> Option<String> {
    for key in PRIMARY_KEYS {
        if let Some(value) = params.get(*key).and_then(Value::as_str) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(truncate(value));
            }
        }
    }
    None
}

fn truncate(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_LEN {
        return value.to_string();
    }
    let head: String = value.chars().take(MAX_VALUE_LEN).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::FnTool;
    use serde_json::json;
    use std::sync::Arc;

    fn params(pairs: &[(&str, &str)]) -> ToolParams {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect()
    }

    #[test]
    fn labels_use_the_primary_parameter() {
        let registry = ToolRegistry::new();
        let label = describe_tool_use("read_file", &params(&[("path", "a.txt")]), &registry);
        assert_eq!(label, "[read_file] a.txt");
    }

    #[test]
    fn registered_tools_fall_back_to_their_description() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FnTool::new("ponder", "thinks hard", |_ctx| async {
            Ok(())
        })));
        let label = describe_tool_use("ponder", &ToolParams::new(), &registry);
        assert_eq!(label, "[ponder] thinks hard");
    }

    #[test]
    fn unknown_tools_get_the_generic_label() {
        let registry = ToolRegistry::new();
        assert_eq!(
            describe_tool_use("mystery", &ToolParams::new(), &registry),
            "[mystery]"
        );
    }

    #[test]
    fn long_values_are_truncated() {
        let registry = ToolRegistry::new();
        let long = "x".repeat(200);
        let label = describe_tool_use("run", &params(&[("command", &long)]), &registry);
        assert!(label.chars().count() < 80);
        assert!(label.ends_with('…'));
    }
}
