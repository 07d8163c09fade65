//! Session-lane invariants computed over a complete trace
//!
//! Each pass is independent of the protocol fold, so a trace that broke the
//! state machine early is still checked end to end.

use super::engine::SessionTrace;
use super::finding::{Lane, Severity, Subject, ValidationFinding};
use crate::codec::PendingClientRequest;
use crate::message::{FromAgent, FromClient, Message};
use crate::schema::{SessionId, SessionModeState, SessionUpdate, StopReason};
use std::collections::HashMap;

pub const CANCEL_MISMATCH: &str = "SESSION.CANCEL_MISMATCH";
pub const MULTIPLE_PROMPTS_IN_FLIGHT: &str = "SESSION.MULTIPLE_PROMPTS_IN_FLIGHT";
pub const RESULT_WITHOUT_PROMPT: &str = "SESSION.RESULT_WITHOUT_PROMPT";
pub const INVALID_MODE_ID: &str = "SESSION.INVALID_MODE_ID";
pub const CURRENT_MODE_NOT_IN_AVAILABLE_MODES: &str = "SESSION.CURRENT_MODE_NOT_IN_AVAILABLE_MODES";

/// All session-lane findings, cancel pass first
pub fn check(trace: &SessionTrace) -> Vec<ValidationFinding> {
    let mut findings = check_cancel(trace);
    findings.extend(check_concurrency(trace));
    findings.extend(check_modes(trace));
    findings
}

fn prompt_session(message: &Message) -> Option<&SessionId> {
    match message {
        Message::FromClient(FromClient::SessionPromptRequest(request)) => Some(&request.session_id),
        _ => None,
    }
}

fn prompt_result(message: &Message) -> Option<(&SessionId, StopReason)> {
    match message {
        Message::FromAgent(FromAgent::SessionPromptResult(scoped)) => {
            Some((&scoped.session_id, scoped.response.stop_reason))
        }
        _ => None,
    }
}

fn cancel_session(message: &Message) -> Option<&SessionId> {
    match message {
        Message::FromClient(FromClient::SessionCancel(notification)) => {
            Some(&notification.session_id)
        }
        _ => None,
    }
}

/// A cancel sent between the first prompt of the session and its result
/// obliges the agent to answer with `cancelled`
pub fn check_cancel(trace: &SessionTrace) -> Vec<ValidationFinding> {
    let session_id = &trace.session_id;
    let messages = &trace.messages;

    let Some(prompt_at) = messages
        .iter()
        .position(|m| prompt_session(m) == Some(session_id))
    else {
        return Vec::new();
    };
    let Some((result_at, stop_reason)) = messages
        .iter()
        .enumerate()
        .skip(prompt_at + 1)
        .find_map(|(index, m)| match prompt_result(m) {
            Some((id, stop_reason)) if id == session_id => Some((index, stop_reason)),
            _ => None,
        })
    else {
        return Vec::new();
    };

    let cancelled = messages[prompt_at + 1..result_at]
        .iter()
        .any(|m| cancel_session(m) == Some(session_id));
    if !cancelled || stop_reason == StopReason::Cancelled {
        return Vec::new();
    }

    vec![ValidationFinding::new(
        Lane::Session,
        Severity::Error,
        CANCEL_MISMATCH,
        format!(
            "prompt was cancelled but the agent answered with stop reason {}",
            stop_reason
        ),
        Subject::PromptTurn(session_id.clone(), 0),
    )
    .at_index(result_at)]
}

/// At most one prompt per session may be open; results need an open prompt
pub fn check_concurrency(trace: &SessionTrace) -> Vec<ValidationFinding> {
    let mut open: HashMap<&SessionId, usize> = HashMap::new();
    let mut ordinals: HashMap<&SessionId, usize> = HashMap::new();
    let mut findings = Vec::new();

    for (index, message) in trace.messages.iter().enumerate() {
        if let Some(session_id) = prompt_session(message) {
            let ordinal = ordinals.entry(session_id).or_insert(0);
            let counter = open.entry(session_id).or_insert(0);
            if *counter > 0 {
                findings.push(
                    ValidationFinding::new(
                        Lane::Session,
                        Severity::Error,
                        MULTIPLE_PROMPTS_IN_FLIGHT,
                        format!(
                            "prompt sent while {} earlier prompt(s) await a result",
                            counter
                        ),
                        Subject::PromptTurn(session_id.clone(), *ordinal),
                    )
                    .at_index(index),
                );
            }
            *counter += 1;
            *ordinal += 1;
        } else if let Some((session_id, _)) = prompt_result(message) {
            close_prompt(&mut open, session_id, index, message, &mut findings);
        } else if let Message::FromAgent(FromAgent::ClientRequestError {
            request: PendingClientRequest::SessionPrompt(session_id),
            ..
        }) = message
        {
            close_prompt(&mut open, session_id, index, message, &mut findings);
        }
    }

    findings
}

fn close_prompt<'a>(
    open: &mut HashMap<&'a SessionId, usize>,
    session_id: &'a SessionId,
    index: usize,
    message: &Message,
    findings: &mut Vec<ValidationFinding>,
) {
    let counter = open.entry(session_id).or_insert(0);
    if *counter == 0 {
        findings.push(
            ValidationFinding::new(
                Lane::Session,
                Severity::Error,
                RESULT_WITHOUT_PROMPT,
                "prompt result without an open prompt",
                Subject::message_at(index, message),
            )
            .with_session(Some(session_id))
            .at_index(index),
        );
    } else {
        *counter -= 1;
    }
}

/// Mode ids must come from the most recently advertised mode state
pub fn check_modes(trace: &SessionTrace) -> Vec<ValidationFinding> {
    let session_id = &trace.session_id;
    let mut advertised: Option<&SessionModeState> = None;
    let mut findings = Vec::new();

    for (index, message) in trace.messages.iter().enumerate() {
        let (code, mode_id) = match message {
            Message::FromAgent(FromAgent::SessionNewResult(response))
                if &response.session_id == session_id =>
            {
                if let Some(modes) = &response.modes {
                    advertised = Some(modes);
                    (CURRENT_MODE_NOT_IN_AVAILABLE_MODES, &modes.current_mode_id)
                } else {
                    continue;
                }
            }
            Message::FromAgent(FromAgent::SessionLoadResult(scoped))
                if &scoped.session_id == session_id =>
            {
                if let Some(modes) = &scoped.response.modes {
                    advertised = Some(modes);
                    (CURRENT_MODE_NOT_IN_AVAILABLE_MODES, &modes.current_mode_id)
                } else {
                    continue;
                }
            }
            Message::FromClient(FromClient::SessionSetModeRequest(request))
                if &request.session_id == session_id =>
            {
                (INVALID_MODE_ID, &request.mode_id)
            }
            Message::FromAgent(FromAgent::SessionUpdate(notification))
                if &notification.session_id == session_id =>
            {
                match &notification.update {
                    SessionUpdate::CurrentModeUpdate(update) => {
                        (CURRENT_MODE_NOT_IN_AVAILABLE_MODES, &update.current_mode_id)
                    }
                    _ => continue,
                }
            }
            _ => continue,
        };

        let severity = match advertised {
            Some(modes) if modes.contains(mode_id) => continue,
            Some(_) => Severity::Error,
            None => Severity::Warning,
        };
        let description = match severity {
            Severity::Error => format!("mode '{}' is not among the advertised modes", mode_id),
            _ => format!("mode '{}' used before any modes were advertised", mode_id),
        };
        findings.push(
            ValidationFinding::new(
                Lane::Session,
                severity,
                code,
                description,
                Subject::Session(session_id.clone()),
            )
            .at_index(index),
        );
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SessionScoped;
    use crate::schema::*;

    fn trace(messages: Vec<Message>) -> SessionTrace {
        SessionTrace {
            session_id: SessionId::new("s1"),
            messages,
        }
    }

    fn prompt() -> Message {
        FromClient::SessionPromptRequest(PromptRequest::new("s1", vec![ContentBlock::text("go")]))
            .into()
    }

    fn result(stop_reason: StopReason) -> Message {
        FromAgent::SessionPromptResult(SessionScoped::new("s1", PromptResponse { stop_reason }))
            .into()
    }

    fn cancel() -> Message {
        FromClient::SessionCancel(CancelNotification {
            session_id: "s1".into(),
        })
        .into()
    }

    fn codes(findings: &[ValidationFinding]) -> Vec<&str> {
        findings.iter().filter_map(|f| f.code()).collect()
    }

    #[test]
    fn test_cancel_after_result_is_fine() {
        let findings = check_cancel(&trace(vec![prompt(), result(StopReason::EndTurn), cancel()]));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_cancel_mismatch_anchors_to_result() {
        let findings = check_cancel(&trace(vec![prompt(), cancel(), result(StopReason::MaxTokens)]));
        assert_eq!(codes(&findings), vec![CANCEL_MISMATCH]);
        assert_eq!(findings[0].trace_index, Some(2));
        assert_eq!(findings[0].subject, Subject::PromptTurn("s1".into(), 0));
    }

    #[test]
    fn test_result_without_prompt() {
        let findings = check_concurrency(&trace(vec![result(StopReason::EndTurn)]));
        assert_eq!(codes(&findings), vec![RESULT_WITHOUT_PROMPT]);
    }

    #[test]
    fn test_cancel_does_not_close_prompt() {
        let findings = check_concurrency(&trace(vec![prompt(), cancel(), prompt()]));
        assert_eq!(codes(&findings), vec![MULTIPLE_PROMPTS_IN_FLIGHT]);
        assert_eq!(findings[0].subject, Subject::PromptTurn("s1".into(), 1));
    }

    #[test]
    fn test_sessions_are_counted_separately() {
        let other: Message = FromClient::SessionPromptRequest(PromptRequest::new(
            "s2",
            vec![ContentBlock::text("go")],
        ))
        .into();
        let findings = check_concurrency(&trace(vec![prompt(), other]));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_mode_without_advertisement_is_a_warning() {
        let set_mode: Message = FromClient::SessionSetModeRequest(SetSessionModeRequest {
            session_id: "s1".into(),
            mode_id: "plan".into(),
        })
        .into();
        let findings = check_modes(&trace(vec![set_mode]));
        assert_eq!(codes(&findings), vec![INVALID_MODE_ID]);
        assert_eq!(findings[0].severity, Severity::Warning);
    }

    #[test]
    fn test_advertised_current_mode_must_be_available() {
        let created: Message = FromAgent::SessionNewResult(NewSessionResponse {
            session_id: "s1".into(),
            modes: Some(SessionModeState {
                current_mode_id: "turbo".into(),
                available_modes: vec![SessionMode::new("default", "Default")],
            }),
        })
        .into();
        let findings = check_modes(&trace(vec![created]));
        assert_eq!(codes(&findings), vec![CURRENT_MODE_NOT_IN_AVAILABLE_MODES]);
        assert_eq!(findings[0].severity, Severity::Error);
    }
}
