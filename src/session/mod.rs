//! Streaming session state for one assistant turn.
//!
//! One `StreamingSession` exists per in-flight turn. The decoder appends and
//! grows blocks through the [`SessionHandle`]; the dispatcher walks them by
//! cursor. The `locked`/`pending_re_present` pair is the only reentrancy
//! guard: concurrent `present` calls either become the active pass or
//! coalesce into a single "run once more" request.

use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use uuid::Uuid;

use crate::block::{ContentBlock, ResultContent, ToolParams};
use crate::error::{EngineError, Result};
use crate::events::TurnId;
use crate::repetition::{RepetitionDecision, RepetitionDetector, ToolSignature};

/// Whether a tool-result push was recorded or rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// This push became the turn's one tool result.
    Recorded,
    /// A tool result already exists for this turn; the push was refused.
    AlreadyUsed,
}

/// Outcome of trying to start a presentation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassState {
    Acquired,
    /// Another pass is active; the request was coalesced.
    Busy,
    Aborted,
}

#[derive(Debug)]
struct StreamingSession {
    turn_id: TurnId,
    blocks: Vec<ContentBlock>,
    cursor: usize,
    locked: bool,
    pending_re_present: bool,
    stream_complete: bool,
    turn_ready: bool,
    rejected_tool: bool,
    used_tool: bool,
    aborted: bool,
    mistake_count: u32,
    repetition: RepetitionDetector,
    outgoing: Vec<ResultContent>,
    /// Sanitized narrative already emitted for the cursor block.
    presented_text: String,
    seq: u64,
}

/// Shared handle to the session state.
///
/// The decoder and the dispatcher hold clones of the same handle. The inner
/// mutex guards short critical sections only and is never held across an
/// await point.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<StreamingSession>>,
    ready_notify: Arc<Notify>,
}

impl SessionHandle {
    pub(crate) fn new(repetition_window: usize) -> Self {
        Self::with_detector(RepetitionDetector::new(repetition_window))
    }

    /// Start the next turn of the same task: fresh state, but the
    /// repetition history carries over so identical calls are throttled
    /// across turns (the detector is keyed by task, not by turn).
    pub(crate) fn continuing(previous: &SessionHandle) -> Self {
        Self::with_detector(previous.with(|s| s.repetition.clone()))
    }

    fn with_detector(repetition: RepetitionDetector) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamingSession {
                turn_id: Uuid::new_v4(),
                blocks: Vec::new(),
                cursor: 0,
                locked: false,
                pending_re_present: false,
                stream_complete: false,
                turn_ready: false,
                rejected_tool: false,
                used_tool: false,
                aborted: false,
                mistake_count: 0,
                repetition,
                outgoing: Vec::new(),
                presented_text: String::new(),
                seq: 0,
            })),
            ready_notify: Arc::new(Notify::new()),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut StreamingSession) -> R) -> R {
        let mut session = self.inner.lock().expect("session mutex poisoned");
        f(&mut session)
    }

    pub fn turn_id(&self) -> TurnId {
        self.with(|s| s.turn_id)
    }

    // -- Decoder-facing surface --

    /// Append a block produced by the decoder. Returns its index.
    pub fn append_block(&self, block: ContentBlock) -> usize {
        self.with(|s| {
            s.blocks.push(block);
            s.blocks.len() - 1
        })
    }

    /// Extend the content of a partial text block.
    pub fn extend_text(&self, index: usize, chunk: &str) -> Result<()> {
        self.with(|s| match s.blocks.get_mut(index) {
            Some(ContentBlock::Text { content, partial }) => {
                if !*partial {
                    return Err(EngineError::InvalidState(format!(
                        "text block {index} is final and may not be mutated"
                    )));
                }
                content.push_str(chunk);
                Ok(())
            }
            Some(_) => Err(EngineError::InvalidState(format!(
                "block {index} is not a text block"
            ))),
            None => Err(EngineError::InvalidState(format!(
                "no block at index {index}"
            ))),
        })
    }

    /// Merge streamed parameters into a partial tool-use block.
    pub fn merge_tool_params(&self, index: usize, incoming: ToolParams) -> Result<()> {
        self.with(|s| match s.blocks.get_mut(index) {
            Some(ContentBlock::ToolUse { params, partial, .. }) => {
                if !*partial {
                    return Err(EngineError::InvalidState(format!(
                        "tool-use block {index} is final and may not be mutated"
                    )));
                }
                for (key, value) in incoming {
                    params.insert(key, value);
                }
                Ok(())
            }
            Some(_) => Err(EngineError::InvalidState(format!(
                "block {index} is not a tool-use block"
            ))),
            None => Err(EngineError::InvalidState(format!(
                "no block at index {index}"
            ))),
        })
    }

    /// Mark a block final. Final blocks are immutable for the rest of the
    /// turn; finalizing twice is a no-op.
    pub fn finalize_block(&self, index: usize) -> Result<()> {
        self.with(|s| match s.blocks.get_mut(index) {
            Some(block) => {
                block.set_final();
                Ok(())
            }
            None => Err(EngineError::InvalidState(format!(
                "no block at index {index}"
            ))),
        })
    }

    /// Signal that no more blocks will arrive this turn.
    pub fn set_stream_complete(&self) {
        self.with(|s| s.stream_complete = true);
    }

    /// Request cancellation. Observed at the top of the next presentation
    /// pass; side effects already committed are not rolled back.
    pub fn abort(&self) {
        self.with(|s| s.aborted = true);
    }

    // -- Observers --

    pub fn blocks_len(&self) -> usize {
        self.with(|s| s.blocks.len())
    }

    pub fn is_stream_complete(&self) -> bool {
        self.with(|s| s.stream_complete)
    }

    pub fn is_turn_ready(&self) -> bool {
        self.with(|s| s.turn_ready)
    }

    pub fn is_aborted(&self) -> bool {
        self.with(|s| s.aborted)
    }

    pub fn rejected_tool(&self) -> bool {
        self.with(|s| s.rejected_tool)
    }

    pub fn used_tool(&self) -> bool {
        self.with(|s| s.used_tool)
    }

    pub fn mistake_count(&self) -> u32 {
        self.with(|s| s.mistake_count)
    }

    /// Drain the content accumulated for the next model request: tool
    /// results and the synthetic notices pushed alongside them.
    pub fn take_outgoing(&self) -> Vec<ResultContent> {
        self.with(|s| std::mem::take(&mut s.outgoing))
    }

    /// Wait until the turn is ready for the next model request.
    ///
    /// Returns immediately if the turn is already ready; otherwise blocks
    /// until the dispatcher flips `turn_ready`.
    pub async fn wait_turn_ready(&self) {
        loop {
            if self.is_turn_ready() {
                return;
            }
            self.ready_notify.notified().await;
        }
    }

    // -- Dispatcher-facing surface --

    pub(crate) fn begin_pass(&self) -> PassState {
        self.with(|s| {
            if s.aborted {
                return PassState::Aborted;
            }
            if s.locked {
                s.pending_re_present = true;
                return PassState::Busy;
            }
            s.locked = true;
            PassState::Acquired
        })
    }

    /// Release the pass lock. Returns whether a coalesced re-present request
    /// arrived while the pass was running.
    pub(crate) fn end_pass(&self) -> bool {
        self.with(|s| {
            s.locked = false;
            std::mem::take(&mut s.pending_re_present)
        })
    }

    /// Copy-on-read snapshot of the cursor block; the decoder may keep
    /// mutating the buffer while the copy is presented.
    pub(crate) fn snapshot_current(&self) -> Option<ContentBlock> {
        self.with(|s| s.blocks.get(s.cursor).cloned())
    }

    pub(crate) fn cursor(&self) -> usize {
        self.with(|s| s.cursor)
    }

    pub(crate) fn advance_cursor(&self) {
        self.with(|s| {
            s.cursor += 1;
            s.presented_text.clear();
        });
    }

    /// Whether tool use has been cut short for the rest of the turn.
    pub(crate) fn turn_interrupted(&self) -> bool {
        self.with(|s| s.rejected_tool || s.used_tool)
    }

    /// Flip `turn_ready` if the turn is complete. True on the one call that
    /// performed the flip.
    pub(crate) fn mark_turn_ready(&self) -> bool {
        let flipped = self.with(|s| {
            if s.turn_ready || !s.stream_complete || s.cursor < s.blocks.len() {
                return false;
            }
            s.turn_ready = true;
            true
        });
        if flipped {
            self.ready_notify.notify_waiters();
        }
        flipped
    }

    pub(crate) fn presented_text(&self) -> String {
        self.with(|s| s.presented_text.clone())
    }

    pub(crate) fn note_presented_text(&self, text: String) {
        self.with(|s| s.presented_text = text);
    }

    pub(crate) fn check_repetition(&self, signature: ToolSignature) -> RepetitionDecision {
        self.with(|s| s.repetition.check(signature))
    }

    pub(crate) fn override_repetition(&self, signature: ToolSignature) {
        self.with(|s| s.repetition.override_with(signature));
    }

    pub(crate) fn set_rejected(&self) {
        self.with(|s| s.rejected_tool = true);
    }

    pub(crate) fn record_mistake(&self) -> u32 {
        self.with(|s| {
            s.mistake_count += 1;
            s.mistake_count
        })
    }

    /// Record the turn's one tool result. The first push wins and sets
    /// `used_tool`; later pushes are refused regardless of caller.
    pub(crate) fn push_tool_result(&self, content: Vec<ResultContent>) -> PushOutcome {
        self.with(|s| {
            if s.used_tool {
                return PushOutcome::AlreadyUsed;
            }
            s.used_tool = true;
            s.outgoing.extend(content);
            PushOutcome::Recorded
        })
    }

    /// Append a synthetic notice ("skipped", "already used") without
    /// claiming the turn's tool result.
    pub(crate) fn push_notice(&self, text: String) {
        self.with(|s| s.outgoing.push(ResultContent::Text { text }));
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.with(|s| {
            let seq = s.seq;
            s.seq += 1;
            seq
        })
    }
}
