//! Tool-call repetition throttling.
//!
//! Prevents unbounded identical tool-call loops: when the trailing run of
//! identical `(name, raw params)` signatures fills the window, the next
//! identical call is blocked and the user is asked whether to continue.

use std::collections::VecDeque;

use crate::block::{raw_params, ToolParams};

/// Signature of one completed tool call. Parameters are compared as the raw
/// serialized string, byte for byte, with no canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSignature {
    pub name: String,
    pub params: String,
}

impl ToolSignature {
    pub fn new(name: impl Into<String>, params: &ToolParams) -> Self {
        Self {
            name: name.into(),
            params: raw_params(params),
        }
    }
}

/// Outcome of a repetition check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepetitionDecision {
    Allow,
    /// The trailing identical run reached the window; ask before continuing.
    AskUser { reason: String, detail: String },
}

/// Bounded FIFO of recent tool-call signatures with a trailing-run check.
///
/// Only complete (non-partial) calls are ever checked; the caller is
/// responsible for filtering.
#[derive(Debug, Clone)]
pub struct RepetitionDetector {
    history: VecDeque<ToolSignature>,
    window: usize,
}

impl RepetitionDetector {
    pub fn new(window: usize) -> Self {
        Self {
            history: VecDeque::new(),
            window: window.max(1),
        }
    }

    /// Check a completed call. Allowed calls are recorded; blocked calls are
    /// not, so an override must go through [`RepetitionDetector::override_with`].
    pub fn check(&mut self, signature: ToolSignature) -> RepetitionDecision {
        let run = self
            .history
            .iter()
            .rev()
            .take_while(|seen| **seen == signature)
            .count();
        if run >= self.window {
            return RepetitionDecision::AskUser {
                reason: format!(
                    "'{}' has been called {} times in a row with identical arguments",
                    signature.name,
                    run + 1
                ),
                detail: signature.params.clone(),
            };
        }
        self.record(signature);
        RepetitionDecision::Allow
    }

    /// Record a user-sanctioned call after a block, clearing the run so the
    /// throttle requires a fresh window before prompting again.
    pub fn override_with(&mut self, signature: ToolSignature) {
        self.history.clear();
        self.record(signature);
    }

    fn record(&mut self, signature: ToolSignature) {
        self.history.push_back(signature);
        while self.history.len() > self.window {
            self.history.pop_front();
        }
    }
}
