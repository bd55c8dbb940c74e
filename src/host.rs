//! Host collaborator interfaces: checkpoints, telemetry, turn-ready.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::events::TurnId;

/// Callback invoked when a turn becomes ready for the next model request.
pub type TurnReadyFn = Arc<dyn Fn(TurnId) + Send + Sync>;

/// External durability snapshot taken before a mutating tool runs.
///
/// Best-effort: the pipeline logs a failed save and executes the tool
/// anyway. Rollback after an abort is the checkpoint system's concern, not
/// the engine's.
#[async_trait]
pub trait CheckpointService: Send + Sync {
    async fn save(&self) -> Result<(), EngineError>;
}

/// Fire-and-forget usage and error reporting. Implementations must not
/// block the pipeline.
pub trait TelemetrySink: Send + Sync {
    fn record_tool_usage(&self, name: &str);
    fn log_error(&self, context: &str, error: &EngineError);
}

/// [`TelemetrySink`] backed by `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record_tool_usage(&self, name: &str) {
        tracing::debug!(tool = name, "tool used");
    }

    fn log_error(&self, context: &str, error: &EngineError) {
        tracing::error!(context, error = %error, "engine error");
    }
}
