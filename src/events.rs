//! Turn event stream emitted to the host.
//!
//! The engine owns no UI. Incremental narrative render, tool previews,
//! user-visible errors and the turn-ready signal all flow through a single
//! [`EventSink`] callback, in the order they happen, with monotonic sequence
//! numbers per turn.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::block::ToolOutcome;
use crate::session::SessionHandle;

/// Identifier for one assistant turn.
pub type TurnId = Uuid;

/// Callback used for streaming turn events to the host.
pub type EventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// Stream category for events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TurnEventStream {
    Narrative,
    Tool,
    Approval,
    System,
}

/// Concrete event payloads emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEventPayload {
    /// New sanitized narrative text for block `index`. Re-presenting a
    /// growing partial block only ever emits the unseen suffix.
    TextDelta { index: usize, delta: String },
    /// Best-effort render of a tool call that is still streaming in.
    ToolPreview { index: usize, label: String },
    /// A complete tool call entered the invocation pipeline.
    ToolStarted { name: String, label: String },
    /// The per-block outcome reported back to the model.
    ToolResult { name: String, outcome: ToolOutcome },
    /// Free-text feedback attached to an approval, surfaced to the user.
    ApprovalFeedback { text: String },
    /// User-visible error message. The turn continues.
    Error { message: String },
    /// The next model request may be issued.
    TurnReady,
}

/// Envelope for streaming turn events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    pub turn_id: TurnId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub stream: TurnEventStream,
    pub payload: TurnEventPayload,
}

/// Emits [`TurnEvent`]s for one session. Sequence numbers live in the
/// session so they stay monotonic across presentation passes.
#[derive(Clone)]
pub(crate) struct TurnEventEmitter {
    session: SessionHandle,
    sink: Option<EventSink>,
}

impl TurnEventEmitter {
    pub(crate) fn new(session: SessionHandle, sink: Option<EventSink>) -> Self {
        Self { session, sink }
    }

    pub(crate) fn emit(&self, stream: TurnEventStream, payload: TurnEventPayload) {
        let Some(sink) = &self.sink else {
            return;
        };
        (sink)(TurnEvent {
            turn_id: self.session.turn_id(),
            seq: self.session.next_seq(),
            timestamp: Utc::now(),
            stream,
            payload,
        });
    }
}
