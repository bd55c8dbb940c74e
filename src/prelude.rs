//! Convenience re-exports for common use.

pub use crate::approval::{
    ApprovalChannel, ApprovalKind, ApprovalPolicy, ApprovalRequest, ApprovalResponse,
    StaticApprovals,
};
pub use crate::block::{ContentBlock, ResultContent, ToolOutcome, ToolParams};
pub use crate::config::EngineConfig;
pub use crate::dispatcher::Engine;
pub use crate::driver::{drive, DecoderEvent};
pub use crate::error::{EngineError, Result};
pub use crate::events::{EventSink, TurnEvent, TurnEventPayload, TurnEventStream, TurnId};
pub use crate::host::{CheckpointService, TelemetrySink, TracingTelemetry, TurnReadyFn};
pub use crate::session::{PushOutcome, SessionHandle};
pub use crate::tools::{FnTool, ToolContext, ToolHandler, ToolRegistry};
