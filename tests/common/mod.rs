//! Shared test support: recording sinks, scripted approvals and tools.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use cadenza::prelude::*;

/// Collects every [`TurnEvent`] the engine emits.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<TurnEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> EventSink {
        let events = self.events.clone();
        Arc::new(move |event| {
            events.lock().unwrap().push(event);
        })
    }

    pub fn payloads(&self) -> Vec<TurnEventPayload> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.payload.clone())
            .collect()
    }

    /// All narrative deltas concatenated in emission order.
    pub fn narrative(&self) -> String {
        self.payloads()
            .into_iter()
            .filter_map(|payload| match payload {
                TurnEventPayload::TextDelta { delta, .. } => Some(delta),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, predicate: impl Fn(&TurnEventPayload) -> bool) -> usize {
        self.payloads().iter().filter(|p| predicate(p)).count()
    }

    pub fn sequence_is_monotonic(&self) -> bool {
        let events = self.events.lock().unwrap();
        events.windows(2).all(|pair| pair[0].seq < pair[1].seq)
    }
}

/// Approval channel that replays scripted responses and records requests.
/// Falls back to plain approval once the script runs dry.
#[derive(Clone, Default)]
pub struct ScriptedApprovals {
    responses: Arc<Mutex<VecDeque<ApprovalResponse>>>,
    requests: Arc<Mutex<Vec<ApprovalRequest>>>,
}

impl ScriptedApprovals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: ApprovalResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ApprovalRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalChannel for ScriptedApprovals {
    async fn ask(&self, request: ApprovalRequest) -> ApprovalResponse {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ApprovalResponse::approve)
    }
}

/// Records each invocation's params and pushes a fixed text result.
pub fn recording_tool(name: &str, calls: Arc<Mutex<Vec<ToolParams>>>) -> FnTool {
    FnTool::new(name, "records invocations", move |mut ctx: ToolContext| {
        let calls = calls.clone();
        async move {
            calls.lock().unwrap().push(ctx.params().clone());
            ctx.push_text("ok");
            Ok(())
        }
    })
}

/// Always fails with a tool-execution error.
pub fn failing_tool(name: &str) -> FnTool {
    let owned = name.to_string();
    FnTool::new(name, "always fails", move |_ctx: ToolContext| {
        let name = owned.clone();
        async move { Err(EngineError::tool(name, "synthetic failure")) }
    })
}

/// Parks until the gate is released, then pushes a result. Lets tests hold
/// the dispatcher suspended mid-pipeline.
pub fn slow_tool(name: &str, gate: Arc<tokio::sync::Notify>) -> FnTool {
    FnTool::new(name, "waits for a gate", move |mut ctx: ToolContext| {
        let gate = gate.clone();
        async move {
            gate.notified().await;
            ctx.push_text("slow done");
            Ok(())
        }
    })
}

/// Checkpoint service that counts saves and optionally fails them.
#[derive(Clone, Default)]
pub struct CountingCheckpoints {
    pub saves: Arc<Mutex<usize>>,
    pub fail: bool,
}

impl CountingCheckpoints {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl CheckpointService for CountingCheckpoints {
    async fn save(&self) -> std::result::Result<(), EngineError> {
        *self.saves.lock().unwrap() += 1;
        if self.fail {
            return Err(EngineError::Checkpoint("synthetic checkpoint failure".into()));
        }
        Ok(())
    }
}

/// Build a tool-use block with string params.
pub fn tool_block(name: &str, pairs: &[(&str, &str)], partial: bool) -> ContentBlock {
    ContentBlock::tool_use(name, string_params(pairs), partial)
}

pub fn string_params(pairs: &[(&str, &str)]) -> ToolParams {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), json!(value)))
        .collect()
}
