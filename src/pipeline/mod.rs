//! Tool invocation pipeline.
//!
//! One state machine per tool-use block: describe → gate on earlier
//! rejection or use → validate → repetition throttle → checkpoint →
//! approval → execute → report. Every fault is converted into the block's
//! result so the model can react; nothing but an abort escapes to the
//! dispatcher.

use serde_json::json;

use crate::approval::{ApprovalKind, ApprovalPolicy, ApprovalRequest, ApprovalResponse};
use crate::block::{ResultContent, ToolOutcome, ToolParams};
use crate::dispatcher::Engine;
use crate::error::{EngineError, Result};
use crate::events::{TurnEventEmitter, TurnEventPayload, TurnEventStream};
use crate::repetition::{RepetitionDecision, ToolSignature};
use crate::session::{PushOutcome, SessionHandle};
use crate::tools::describe_tool_use;
use crate::tools::tool::ToolContext;
use crate::tools::validation::validate_params;

pub(crate) async fn run_tool_use(
    engine: &Engine,
    session: &SessionHandle,
    emitter: &TurnEventEmitter,
    index: usize,
    name: &str,
    params: &ToolParams,
    partial: bool,
) -> Result<()> {
    let label = describe_tool_use(name, params, engine.registry());

    // Partial calls render as a preview and nothing else: no validation,
    // no repetition check, no execution.
    if partial {
        emitter.emit(
            TurnEventStream::Tool,
            TurnEventPayload::ToolPreview { index, label },
        );
        return Ok(());
    }

    if session.rejected_tool() {
        session.push_notice(format!(
            "Skipping {label}: the user declined an earlier tool request in this turn."
        ));
        return Ok(());
    }
    if session.used_tool() {
        session.push_notice(already_used_notice(&label));
        return Ok(());
    }

    emitter.emit(
        TurnEventStream::Tool,
        TurnEventPayload::ToolStarted {
            name: name.to_string(),
            label: label.clone(),
        },
    );

    // Validate: known, permitted in the current capability set, parameters
    // present. Failures end the block, not the turn.
    let Some(handler) = engine.registry().lookup(name) else {
        reject_invalid(engine, session, emitter, name, format!("Unknown tool '{name}'."));
        return Ok(());
    };
    if let Some(allowed) = &engine.config().allowed_tools {
        if !allowed.contains(name) {
            reject_invalid(
                engine,
                session,
                emitter,
                name,
                format!("Tool '{name}' is not permitted in the current mode."),
            );
            return Ok(());
        }
    }
    if let Err(message) = validate_params(handler.required_params(), params) {
        reject_invalid(
            engine,
            session,
            emitter,
            name,
            format!("{label} failed validation: {message}."),
        );
        return Ok(());
    }

    // Repetition throttle. Complete calls only; raw signature equality.
    let signature = ToolSignature::new(name, params);
    if let RepetitionDecision::AskUser { reason, detail } =
        session.check_repetition(signature.clone())
    {
        let response = engine
            .approvals()
            .ask(ApprovalRequest::new(
                ApprovalKind::RepetitionOverride,
                format!("{reason}. Continue anyway?"),
                json!({ "tool": name, "params": detail }),
            ))
            .await;
        if !wants_to_continue(&response) {
            let err = EngineError::RepetitionLimit {
                tool_name: name.to_string(),
                count: engine.config().repetition_window + 1,
            };
            engine.telemetry().log_error("repetition throttle", &err);
            push_error_result(
                session,
                emitter,
                name,
                format!(
                    "{reason}. The call was not executed; vary the arguments or take a different approach."
                ),
            );
            return Ok(());
        }
        session.override_repetition(signature);
    }

    // Best-effort checkpoint before mutating tools. A failed save is logged
    // and never blocks execution.
    if handler.is_mutating() {
        if let Some(checkpoints) = engine.checkpoints() {
            if let Err(err) = checkpoints.save().await {
                tracing::warn!(tool = name, error = %err, "checkpoint save failed; executing anyway");
            }
        }
    }

    // Approval gate. Tools that opt out execute unconditionally.
    let mut result_prefix = None;
    if handler.requires_approval() {
        let decision = match engine.config().approval_policy {
            ApprovalPolicy::Always => ApprovalResponse::approve(),
            ApprovalPolicy::Never => ApprovalResponse::deny(),
            ApprovalPolicy::Ask => {
                engine
                    .approvals()
                    .ask(ApprovalRequest::new(
                        ApprovalKind::ToolUse,
                        label.clone(),
                        json!({ "tool": name, "params": params }),
                    ))
                    .await
            }
        };
        if !decision.approved {
            session.set_rejected();
            let feedback = decision.feedback_trimmed().map(str::to_string);
            let text = match &feedback {
                Some(feedback) => format!("The user declined {label} with feedback: {feedback}"),
                None => format!("The user declined {label}."),
            };
            if session.push_tool_result(vec![ResultContent::text(text)]) == PushOutcome::Recorded {
                emitter.emit(
                    TurnEventStream::Tool,
                    TurnEventPayload::ToolResult {
                        name: name.to_string(),
                        outcome: ToolOutcome::Denied { feedback },
                    },
                );
            }
            return Ok(());
        }
        if let Some(feedback) = decision.feedback_trimmed() {
            emitter.emit(
                TurnEventStream::Approval,
                TurnEventPayload::ApprovalFeedback {
                    text: feedback.to_string(),
                },
            );
            result_prefix = Some(format!(
                "The user approved {label} with feedback: {feedback}"
            ));
        }
    }

    engine.telemetry().record_tool_usage(name);

    let ctx = ToolContext::new(
        name,
        label.as_str(),
        params.clone(),
        session.clone(),
        engine.approvals().clone(),
        emitter.clone(),
        result_prefix,
    );
    match handler.execute(ctx).await {
        Ok(()) => {
            if !session.used_tool() {
                // Handler finished without reporting; keep the one-result
                // protocol whole so the model sees a response.
                let content = vec![ResultContent::text("(tool reported no output)")];
                if session.push_tool_result(content.clone()) == PushOutcome::Recorded {
                    emitter.emit(
                        TurnEventStream::Tool,
                        TurnEventPayload::ToolResult {
                            name: name.to_string(),
                            outcome: ToolOutcome::Accepted { content },
                        },
                    );
                }
            }
        }
        Err(err) => {
            let message = format!("{label} failed: {err}");
            engine.telemetry().log_error("tool execution", &err);
            emitter.emit(
                TurnEventStream::System,
                TurnEventPayload::Error {
                    message: message.clone(),
                },
            );
            push_error_result(session, emitter, name, message);
        }
    }
    Ok(())
}

/// The repetition override proceeds only on approval whose reply is empty
/// or an explicit "continue".
fn wants_to_continue(response: &ApprovalResponse) -> bool {
    response.approved
        && response
            .feedback_trimmed()
            .map_or(true, |reply| reply.eq_ignore_ascii_case("continue"))
}

/// A validation-class failure: count the mistake, log it, and report it as
/// the block's result. The turn is not aborted; the next turn may retry.
fn reject_invalid(
    engine: &Engine,
    session: &SessionHandle,
    emitter: &TurnEventEmitter,
    name: &str,
    message: String,
) {
    session.record_mistake();
    let err = EngineError::Validation(message.clone());
    engine.telemetry().log_error("tool validation", &err);
    push_error_result(session, emitter, name, message);
}

fn already_used_notice(label: &str) -> String {
    format!(
        "{label} was not executed: only one tool may run per turn. \
         Re-issue the call in the next turn if it is still needed."
    )
}

fn push_error_result(
    session: &SessionHandle,
    emitter: &TurnEventEmitter,
    name: &str,
    message: String,
) {
    if session.push_tool_result(vec![ResultContent::text(message.clone())]) == PushOutcome::Recorded
    {
        emitter.emit(
            TurnEventStream::Tool,
            TurnEventPayload::ToolResult {
                name: name.to_string(),
                outcome: ToolOutcome::Errored { message },
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continue_reply_matching_is_exact_but_case_insensitive() {
        let approve = ApprovalResponse::approve();
        assert!(wants_to_continue(&approve));

        let explicit = ApprovalResponse::approve().with_feedback("  Continue ");
        assert!(wants_to_continue(&explicit));

        let other = ApprovalResponse::approve().with_feedback("maybe later");
        assert!(!wants_to_continue(&other));

        let denied = ApprovalResponse::deny().with_feedback("continue");
        assert!(!wants_to_continue(&denied));
    }
}
