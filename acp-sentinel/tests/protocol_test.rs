//! Phase transitions over realistic message sequences

mod common;

use acp_sentinel::codec::PendingClientRequest;
use acp_sentinel::error::ProtocolError;
use acp_sentinel::message::{FromAgent, FromClient, Message};
use acp_sentinel::protocol::{self, Phase, TurnState};
use acp_sentinel::schema::*;
use acp_sentinel::{JsonRpcError, ProtocolSpec};
use common::*;
use rstest::rstest;

fn fold(messages: &[Message]) -> Result<Phase, ProtocolError> {
    protocol::fold(&ProtocolSpec::acp(), messages)
}

#[test]
fn test_handshake_reaches_ready_with_no_sessions() {
    let phase = fold(&handshake()).unwrap();
    assert!(phase.is_ready());
    assert!(phase.context().unwrap().sessions.is_empty());
}

#[rstest]
#[case::new_session(new_session_request())]
#[case::prompt(prompt("s1", "hi"))]
#[case::cancel(cancel("s1"))]
#[case::agent_update(agent_says("s1", "early"))]
#[case::initialize_result(initialized())]
fn test_nothing_precedes_initialize(#[case] first: Message) {
    let err = protocol::step(&Phase::initial(), &first).unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::UnexpectedMessage { phase: "awaiting initialize", .. }
    ));
}

#[test]
fn test_rejected_initialize_can_be_retried() {
    let rejected: Message = FromAgent::ClientRequestError {
        request: PendingClientRequest::Initialize,
        error: JsonRpcError::new(-32602, "unsupported version"),
    }
    .into();
    let phase = fold(&[initialize(), rejected, initialize(), initialized()]).unwrap();
    assert!(phase.is_ready());
}

#[test]
fn test_second_prompt_while_in_flight() {
    let mut messages = session_preamble("s1");
    messages.push(prompt("s1", "first"));
    let phase = fold(&messages).unwrap();

    let err = protocol::step(&phase, &prompt("s1", "second")).unwrap_err();
    assert_eq!(err, ProtocolError::PromptAlreadyInFlight(SessionId::new("s1")));
}

#[test]
fn test_sessions_are_independent() {
    let mut messages = handshake();
    for id in ["s1", "s2"] {
        messages.push(new_session_request());
        messages.push(new_session_result(id, None));
    }
    messages.push(prompt("s1", "one"));
    messages.push(prompt("s2", "two"));
    messages.push(cancel("s2"));
    messages.push(prompt_result("s2", StopReason::Cancelled));

    let phase = fold(&messages).unwrap();
    let context = phase.context().unwrap();
    assert!(context.session(&SessionId::new("s1")).unwrap().turn.is_in_flight());
    assert_eq!(
        context.session(&SessionId::new("s2")).unwrap().turn,
        TurnState::Idle(Some(StopReason::Cancelled))
    );
}

#[test]
fn test_cancel_marks_the_turn() {
    let mut messages = session_preamble("s1");
    messages.push(prompt("s1", "go"));
    messages.push(cancel("s1"));
    let phase = fold(&messages).unwrap();
    assert_eq!(
        phase.context().unwrap().session(&SessionId::new("s1")).unwrap().turn,
        TurnState::PromptInFlight {
            cancel_requested: true
        }
    );
}

#[rstest]
#[case::prompt(prompt("ghost", "hi"), ProtocolError::UnknownSession(SessionId::new("ghost")))]
#[case::cancel_idle(cancel("s1"), ProtocolError::NoPromptInFlight(SessionId::new("s1")))]
#[case::result_idle(
    prompt_result("s1", StopReason::EndTurn),
    ProtocolError::NoPromptInFlight(SessionId::new("s1"))
)]
#[case::duplicate_session(new_session_result("s1", None), ProtocolError::SessionAlreadyExists(SessionId::new("s1")))]
#[case::reinitialize(initialize(), ProtocolError::DuplicateInitialize)]
#[case::permission_idle(
    FromAgent::RequestPermissionRequest(permission_request("s1", "call-1")).into(),
    ProtocolError::NoPromptInFlight(SessionId::new("s1"))
)]
fn test_illegal_moves_from_ready(#[case] message: Message, #[case] expected: ProtocolError) {
    let phase = fold(&session_preamble("s1")).unwrap();
    assert_eq!(protocol::step(&phase, &message).unwrap_err(), expected);
}

#[test]
fn test_extensions_are_always_legal_once_ready() {
    let phase = fold(&handshake()).unwrap();
    let ext: Message = FromClient::ExtNotification {
        method: "_vendor/ping".to_string(),
        params: serde_json::json!({}),
    }
    .into();
    assert_eq!(protocol::step(&phase, &ext).unwrap(), phase);
}

#[test]
fn test_mode_changes_patch_session_state() {
    let mut messages = handshake();
    messages.push(new_session_request());
    messages.push(new_session_result("s1", Some(modes("default", &["default", "plan"]))));
    messages.push(set_mode("s1", "plan"));

    let phase = fold(&messages).unwrap();
    let current = |phase: &Phase| {
        phase
            .context()
            .and_then(|c| c.session(&SessionId::new("s1")))
            .and_then(|s| s.modes.as_ref())
            .map(|m| m.current_mode_id.as_str().to_string())
    };
    assert_eq!(current(&phase).as_deref(), Some("default"));

    let phase = protocol::step(&phase, &mode_set("s1", "plan")).unwrap();
    assert_eq!(current(&phase).as_deref(), Some("plan"));
}
