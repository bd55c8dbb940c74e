//! Approval gate — turns a tool-use proposal into a user decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What a request is asking the user to decide.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalKind {
    /// Execute a proposed tool call.
    ToolUse,
    /// Override the repetition throttle and keep going.
    RepetitionOverride,
    /// A sub-task tool wants to signal completion back to its parent.
    SubTaskCompletion,
}

/// Default decision applied to tools that request approval.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ApprovalPolicy {
    /// Approve without asking.
    Always,
    /// Deny without asking.
    Never,
    /// Route every request through the approval channel.
    #[default]
    Ask,
}

/// A proposal awaiting a user decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub kind: ApprovalKind,
    /// Short human-readable label for the proposal.
    pub summary: String,
    /// Structured detail for richer host UIs.
    pub detail: serde_json::Value,
}

impl ApprovalRequest {
    pub fn new(kind: ApprovalKind, summary: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            kind,
            summary: summary.into(),
            detail,
        }
    }
}

/// The user's decision, optionally carrying a free-text reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalResponse {
    pub approved: bool,
    pub feedback: Option<String>,
}

impl ApprovalResponse {
    pub fn approve() -> Self {
        Self {
            approved: true,
            feedback: None,
        }
    }

    pub fn deny() -> Self {
        Self {
            approved: false,
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: impl Into<String>) -> Self {
        self.feedback = Some(feedback.into());
        self
    }

    /// The attached reply, trimmed, with empty replies treated as absent.
    pub fn feedback_trimmed(&self) -> Option<&str> {
        self.feedback
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Channel through which the engine asks the user for decisions.
///
/// `ask` may suspend indefinitely while the host waits on user input; the
/// dispatcher holds its presentation lock across the wait and coalesces any
/// re-present requests raised meanwhile.
#[async_trait]
pub trait ApprovalChannel: Send + Sync {
    async fn ask(&self, request: ApprovalRequest) -> ApprovalResponse;
}

/// Fixed-decision channel for non-interactive hosts and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticApprovals {
    approved: bool,
}

impl StaticApprovals {
    pub fn approve_all() -> Self {
        Self { approved: true }
    }

    pub fn deny_all() -> Self {
        Self { approved: false }
    }
}

#[async_trait]
impl ApprovalChannel for StaticApprovals {
    async fn ask(&self, _request: ApprovalRequest) -> ApprovalResponse {
        if self.approved {
            ApprovalResponse::approve()
        } else {
            ApprovalResponse::deny()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn static_approvals_return_fixed_decisions() {
        let request = ApprovalRequest::new(ApprovalKind::ToolUse, "run ls", json!({}));
        assert!(StaticApprovals::approve_all().ask(request.clone()).await.approved);
        assert!(!StaticApprovals::deny_all().ask(request).await.approved);
    }

    #[test]
    fn blank_feedback_is_treated_as_absent() {
        let response = ApprovalResponse::approve().with_feedback("   ");
        assert_eq!(response.feedback_trimmed(), None);

        let response = ApprovalResponse::deny().with_feedback("  use rg instead ");
        assert_eq!(response.feedback_trimmed(), Some("use rg instead"));
    }

    #[test]
    fn approval_policy_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(ApprovalPolicy::from_str("ask").unwrap(), ApprovalPolicy::Ask);
        assert_eq!(
            ApprovalPolicy::from_str("Always").unwrap(),
            ApprovalPolicy::Always
        );
    }
}
