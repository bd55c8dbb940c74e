//! Tool handler trait and closure-based wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::approval::{ApprovalChannel, ApprovalKind, ApprovalRequest, ApprovalResponse};
use crate::block::{ResultContent, ToolOutcome, ToolParams};
use crate::error::EngineError;
use crate::events::{TurnEventEmitter, TurnEventPayload, TurnEventStream};
use crate::session::{PushOutcome, SessionHandle};
use crate::text;

/// Context handed to a tool while it executes: the call's parameters plus
/// the engine callbacks for reporting results, surfacing errors and asking
/// for user decisions.
pub struct ToolContext {
    name: String,
    label: String,
    params: ToolParams,
    session: SessionHandle,
    approvals: Arc<dyn ApprovalChannel>,
    emitter: TurnEventEmitter,
    result_prefix: Option<String>,
    pushed: bool,
}

impl ToolContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        params: ToolParams,
        session: SessionHandle,
        approvals: Arc<dyn ApprovalChannel>,
        emitter: TurnEventEmitter,
        result_prefix: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            params,
            session,
            approvals,
            emitter,
            result_prefix,
            pushed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable label describing this call.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn params(&self) -> &ToolParams {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Report the tool's result. The first push per block wins and claims
    /// the turn's single tool result; anything further is refused.
    pub fn push_result(&mut self, content: Vec<ResultContent>) -> PushOutcome {
        if self.pushed {
            tracing::warn!(tool = %self.name, "duplicate result push for this block ignored");
            return PushOutcome::AlreadyUsed;
        }
        let mut full = Vec::with_capacity(content.len() + 1);
        if let Some(prefix) = self.result_prefix.take() {
            full.push(ResultContent::text(prefix));
        }
        full.extend(content);
        match self.session.push_tool_result(full.clone()) {
            PushOutcome::Recorded => {
                self.pushed = true;
                self.emitter.emit(
                    TurnEventStream::Tool,
                    TurnEventPayload::ToolResult {
                        name: self.name.clone(),
                        outcome: ToolOutcome::Accepted { content: full },
                    },
                );
                PushOutcome::Recorded
            }
            PushOutcome::AlreadyUsed => PushOutcome::AlreadyUsed,
        }
    }

    /// Convenience for a single text result.
    pub fn push_text(&mut self, text: impl Into<String>) -> PushOutcome {
        self.push_result(vec![ResultContent::text(text)])
    }

    /// Surface a user-visible error and report it as the tool's result text
    /// so the model can react. The turn continues.
    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(tool = %self.name, error = %message, "tool reported an error");
        self.emitter.emit(
            TurnEventStream::System,
            TurnEventPayload::Error {
                message: message.clone(),
            },
        );
        if self.pushed {
            return;
        }
        if self.session.push_tool_result(vec![ResultContent::text(message.clone())])
            == PushOutcome::Recorded
        {
            self.pushed = true;
            self.emitter.emit(
                TurnEventStream::Tool,
                TurnEventPayload::ToolResult {
                    name: self.name.clone(),
                    outcome: ToolOutcome::Errored { message },
                },
            );
        }
    }

    /// Ask the user to approve an operation this tool wants to perform.
    pub async fn ask_approval(
        &self,
        summary: impl Into<String>,
        detail: Value,
    ) -> ApprovalResponse {
        self.approvals
            .ask(ApprovalRequest::new(ApprovalKind::ToolUse, summary, detail))
            .await
    }

    /// Ask whether a sub-task may signal completion back to its parent.
    /// Same protocol as [`ToolContext::ask_approval`], different prompt.
    pub async fn ask_completion_approval(
        &self,
        summary: impl Into<String>,
        detail: Value,
    ) -> ApprovalResponse {
        self.approvals
            .ask(ApprovalRequest::new(
                ApprovalKind::SubTaskCompletion,
                summary,
                detail,
            ))
            .await
    }

    /// Sanitize streamed text the same way narrative presentation does.
    pub fn sanitize(&self, text: &str) -> String {
        text::sanitize(text)
    }
}

/// Core tool trait — implement to expose a capability to the engine.
///
/// The engine validates, throttles, checkpoints and gates the call before
/// `execute` runs; the handler only performs the work and reports through
/// the context.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// Parameter names that must be present before execution.
    fn required_params(&self) -> &[&str] {
        &[]
    }

    /// Whether the tool mutates external state. Mutating tools get a
    /// best-effort checkpoint before they run.
    fn is_mutating(&self) -> bool {
        false
    }

    /// Whether execution must pass the approval gate. Tools that return
    /// false execute unconditionally once validated.
    fn requires_approval(&self) -> bool {
        true
    }

    /// Run the tool. Errors are caught at the pipeline boundary and become
    /// the tool's result.
    async fn execute(&self, ctx: ToolContext) -> Result<(), EngineError>;
}

/// Type alias for the closure-based tool handler function.
type HandlerFn = dyn Fn(ToolContext) -> Pin<Box<dyn Future<Output = Result<(), EngineError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct FnTool {
    name: String,
    description: String,
    required_params: Vec<&'static str>,
    mutating: bool,
    requires_approval: bool,
    handler: Arc<HandlerFn>,
}

impl FnTool {
    /// Create a tool from a closure.
    pub fn new<F, Fut>(name: impl Into<String>, description: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            required_params: Vec::new(),
            mutating: false,
            requires_approval: true,
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }

    pub fn with_required_params(mut self, params: &[&'static str]) -> Self {
        self.required_params = params.to_vec();
        self
    }

    pub fn mutating(mut self, mutating: bool) -> Self {
        self.mutating = mutating;
        self
    }

    pub fn requires_approval(mut self, requires: bool) -> Self {
        self.requires_approval = requires;
        self
    }
}

#[async_trait]
impl ToolHandler for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn required_params(&self) -> &[&str] {
        &self.required_params
    }

    fn is_mutating(&self) -> bool {
        self.mutating
    }

    fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    async fn execute(&self, ctx: ToolContext) -> Result<(), EngineError> {
        (self.handler)(ctx).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("mutating", &self.mutating)
            .field("requires_approval", &self.requires_approval)
            .finish()
    }
}
