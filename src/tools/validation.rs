//! Validate a tool call before execution.

use serde_json::Value;

use crate::block::ToolParams;

/// Check that every required parameter is present and non-empty.
///
/// Returns `Ok(())` when valid, `Err(message)` describing the first
/// violation found.
pub fn validate_params(required: &[&str], params: &ToolParams) -> Result<(), String> {
    for name in required {
        match params.get(*name) {
            None | Some(Value::Null) => {
                return Err(format!("missing required parameter '{name}'"));
            }
            Some(Value::String(value)) if value.trim().is_empty() => {
                return Err(format!("required parameter '{name}' is empty"));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> ToolParams {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn accepts_params_with_all_required_fields() {
        let params = params(&[("path", json!("a.txt"))]);
        assert!(validate_params(&["path"], &params).is_ok());
    }

    #[test]
    fn rejects_missing_required_field() {
        let params = params(&[]);
        let err = validate_params(&["path"], &params).unwrap_err();
        assert!(err.contains("missing required parameter 'path'"));
    }

    #[test]
    fn rejects_null_and_blank_values() {
        let null_params = params(&[("path", json!(null))]);
        assert!(validate_params(&["path"], &null_params).is_err());

        let params = params(&[("path", json!("   "))]);
        let err = validate_params(&["path"], &params).unwrap_err();
        assert!(err.contains("is empty"));
    }

    #[test]
    fn reports_the_first_missing_field() {
        let params = params(&[("path", json!("a.txt"))]);
        let err = validate_params(&["path", "content"], &params).unwrap_err();
        assert!(err.contains("'content'"));
    }

    #[test]
    fn non_string_values_count_as_present() {
        let params = params(&[("count", json!(3)), ("flags", json!(["a"]))]);
        assert!(validate_params(&["count", "flags"], &params).is_ok());
    }
}
