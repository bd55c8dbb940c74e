//! Error types for Cadenza.

pub mod unified;

pub use unified::ErrorCategory;

use thiserror::Error;

/// Primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Repetition limit: '{tool_name}' called {count} times in a row with identical arguments")]
    RepetitionLimit { tool_name: String, count: usize },

    #[error("Tool execution error: {tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Turn aborted")]
    Aborted,

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a tool-execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::RepetitionLimit { .. } => ErrorCategory::Repetition,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Checkpoint(_) => ErrorCategory::Checkpoint,
            Self::Aborted => ErrorCategory::Abort,
            Self::InvalidState(_) => ErrorCategory::State,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether the pipeline can convert this error into a tool result and
    /// keep the turn alive. Only an observed abort ends the turn.
    pub fn is_recoverable(&self) -> bool {
        self.category().is_recoverable()
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_is_not_recoverable() {
        assert!(!EngineError::Aborted.is_recoverable());
    }

    #[test]
    fn pipeline_faults_are_recoverable() {
        assert!(EngineError::Validation("missing param".into()).is_recoverable());
        assert!(EngineError::tool("read_file", "boom").is_recoverable());
        assert!(EngineError::Checkpoint("disk full".into()).is_recoverable());
        assert!(EngineError::RepetitionLimit {
            tool_name: "search".into(),
            count: 3,
        }
        .is_recoverable());
    }

    #[test]
    fn categories_match_variants() {
        assert_eq!(
            EngineError::Validation("x".into()).category(),
            ErrorCategory::Validation
        );
        assert_eq!(EngineError::Aborted.category(), ErrorCategory::Abort);
        assert_eq!(
            EngineError::tool("t", "m").category(),
            ErrorCategory::ToolExecution
        );
    }
}
