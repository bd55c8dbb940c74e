//! Stream dispatcher — the reentrant presentation driver.
//!
//! The decoder calls [`Engine::present`] once per incoming chunk, far more
//! often than there are finalized blocks. The session's `locked` /
//! `pending_re_present` pair converts unbounded re-entry into "run now" vs
//! "run once more after I finish": at most one pass is ever active, and no
//! block is presented twice in its final form.

use std::sync::Arc;

use crate::approval::ApprovalChannel;
use crate::block::ContentBlock;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::events::{EventSink, TurnEventEmitter, TurnEventPayload, TurnEventStream};
use crate::host::{CheckpointService, TelemetrySink, TracingTelemetry, TurnReadyFn};
use crate::pipeline;
use crate::session::{PassState, SessionHandle};
use crate::text;
use crate::tools::ToolRegistry;

/// The streaming execution engine: walks a session's content blocks,
/// presents narrative text as it arrives, and brokers embedded tool-use
/// requests through the invocation pipeline.
pub struct Engine {
    config: EngineConfig,
    registry: Arc<ToolRegistry>,
    approvals: Arc<dyn ApprovalChannel>,
    checkpoints: Option<Arc<dyn CheckpointService>>,
    telemetry: Arc<dyn TelemetrySink>,
    event_sink: Option<EventSink>,
    turn_ready: Option<TurnReadyFn>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        registry: Arc<ToolRegistry>,
        approvals: Arc<dyn ApprovalChannel>,
    ) -> Self {
        Self {
            config,
            registry,
            approvals,
            checkpoints: None,
            telemetry: Arc::new(TracingTelemetry),
            event_sink: None,
            turn_ready: None,
        }
    }

    /// Attach a checkpoint service, consulted before mutating tools run.
    pub fn with_checkpoints(mut self, checkpoints: Arc<dyn CheckpointService>) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Attach the sink receiving narrative deltas, tool events and errors.
    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Attach the callback fired when a turn becomes ready for the next
    /// model request.
    pub fn with_turn_ready(mut self, notifier: TurnReadyFn) -> Self {
        self.turn_ready = Some(notifier);
        self
    }

    /// Start a fresh session for one assistant turn.
    pub fn new_session(&self) -> SessionHandle {
        SessionHandle::new(self.config.repetition_window)
    }

    /// Start the next turn of the same task. Turn-scoped flags reset, but
    /// the repetition history carries over: one tool runs per turn, so an
    /// identical-call loop only ever shows up across turns.
    pub fn continue_session(&self, previous: &SessionHandle) -> SessionHandle {
        SessionHandle::continuing(previous)
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub(crate) fn approvals(&self) -> &Arc<dyn ApprovalChannel> {
        &self.approvals
    }

    pub(crate) fn checkpoints(&self) -> Option<&Arc<dyn CheckpointService>> {
        self.checkpoints.as_ref()
    }

    pub(crate) fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.telemetry
    }

    /// Present the session's pending blocks. Safe to call repeatedly and
    /// re-entrantly: a call that finds a pass already active coalesces into
    /// a single rerun and returns immediately.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Aborted`] when the session's abort flag is
    /// observed; every other fault is converted into results/events and the
    /// turn continues.
    pub async fn present(&self, session: &SessionHandle) -> Result<()> {
        loop {
            match session.begin_pass() {
                PassState::Aborted => return Err(EngineError::Aborted),
                PassState::Busy => return Ok(()),
                PassState::Acquired => {}
            }
            let outcome = self.run_pass(session).await;
            let rerun = session.end_pass();
            outcome?;
            if !rerun {
                return Ok(());
            }
            tracing::trace!(turn_id = %session.turn_id(), "coalesced re-present");
        }
    }

    /// One presentation pass: an explicit loop over the blocks that are
    /// ready, bounded by the configured iteration cap.
    async fn run_pass(&self, session: &SessionHandle) -> Result<()> {
        let emitter = TurnEventEmitter::new(session.clone(), self.event_sink.clone());
        for _ in 0..self.config.max_pass_iterations {
            if session.is_aborted() {
                return Err(EngineError::Aborted);
            }

            // Copy-on-read: the decoder may keep mutating the buffer while
            // this block is presented.
            let Some(snapshot) = session.snapshot_current() else {
                self.finish_if_complete(session, &emitter);
                return Ok(());
            };
            let index = session.cursor();
            let is_final = snapshot.is_final();

            match snapshot {
                ContentBlock::Text { content, .. } => {
                    self.present_text(session, &emitter, index, &content);
                }
                ContentBlock::ToolUse {
                    name,
                    params,
                    partial,
                } => {
                    pipeline::run_tool_use(self, session, &emitter, index, &name, &params, partial)
                        .await?;
                }
            }

            // Advance only past final blocks, or past anything once the
            // turn was cut short by a rejection or a completed tool use.
            if !is_final && !session.turn_interrupted() {
                return Ok(());
            }
            session.advance_cursor();
        }
        tracing::warn!(
            turn_id = %session.turn_id(),
            cap = self.config.max_pass_iterations,
            "presentation pass hit the iteration cap"
        );
        Ok(())
    }

    fn present_text(
        &self,
        session: &SessionHandle,
        emitter: &TurnEventEmitter,
        index: usize,
        content: &str,
    ) {
        let previous = session.presented_text();
        let sanitized = text::sanitize(content);
        if let Some(delta) = text::render_delta(&previous, &sanitized) {
            emitter.emit(
                TurnEventStream::Narrative,
                TurnEventPayload::TextDelta { index, delta },
            );
        }
        session.note_presented_text(sanitized);
    }

    fn finish_if_complete(&self, session: &SessionHandle, emitter: &TurnEventEmitter) {
        if session.mark_turn_ready() {
            tracing::debug!(turn_id = %session.turn_id(), "turn ready");
            emitter.emit(TurnEventStream::System, TurnEventPayload::TurnReady);
            if let Some(notify) = &self.turn_ready {
                notify(session.turn_id());
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("checkpoints", &self.checkpoints.as_ref().map(|_| ".."))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::StaticApprovals;

    fn engine() -> Engine {
        Engine::new(
            EngineConfig::default(),
            Arc::new(ToolRegistry::new()),
            Arc::new(StaticApprovals::approve_all()),
        )
    }

    #[tokio::test]
    async fn empty_incomplete_stream_is_not_ready() {
        let engine = engine();
        let session = engine.new_session();
        engine.present(&session).await.unwrap();
        assert!(!session.is_turn_ready());
    }

    #[tokio::test]
    async fn empty_complete_stream_is_ready() {
        let engine = engine();
        let session = engine.new_session();
        session.set_stream_complete();
        engine.present(&session).await.unwrap();
        assert!(session.is_turn_ready());
    }

    #[tokio::test]
    async fn abort_raises_before_processing() {
        let engine = engine();
        let session = engine.new_session();
        session.append_block(ContentBlock::text("hello", false));
        session.abort();
        let err = engine.present(&session).await.unwrap_err();
        assert!(matches!(err, EngineError::Aborted));
    }

    #[tokio::test]
    async fn partial_text_block_does_not_advance_the_cursor() {
        let engine = engine();
        let session = engine.new_session();
        session.append_block(ContentBlock::text("par", true));
        engine.present(&session).await.unwrap();
        assert_eq!(session.cursor(), 0);

        session.extend_text(0, "tial").unwrap();
        session.finalize_block(0).unwrap();
        engine.present(&session).await.unwrap();
        assert_eq!(session.cursor(), 1);
    }
}
