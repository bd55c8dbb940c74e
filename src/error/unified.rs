//! Fault classification for recovery routing.

use serde::{Deserialize, Serialize};

/// Broad fault category, used by the pipeline to decide whether a fault is
/// converted into a tool result or ends the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Repetition,
    ToolExecution,
    Checkpoint,
    Configuration,
    Serialization,
    Io,
    State,
    Abort,
}

impl ErrorCategory {
    /// Everything except an abort is caught at the pipeline boundary and
    /// reported back to the model as a result; the turn keeps going.
    pub fn is_recoverable(self) -> bool {
        !matches!(self, Self::Abort)
    }
}
