//! Trace replay against the session-lane invariants

mod common;

use acp_sentinel::message::Message;
use acp_sentinel::schema::{SessionId, StopReason};
use acp_sentinel::validation::session_lanes::{
    CANCEL_MISMATCH, CURRENT_MODE_NOT_IN_AVAILABLE_MODES, INVALID_MODE_ID,
    MULTIPLE_PROMPTS_IN_FLIGHT,
};
use acp_sentinel::validation::{
    self, decode_jsonl, DomainProfile, EvalProfile, Lane, MetadataPolicy, Severity, Subject,
    ValidationOptions,
};
use acp_sentinel::ProtocolSpec;
use common::*;
use rstest::rstest;

fn validate(messages: Vec<Message>) -> validation::ValidationReport {
    validation::run("s1", &ProtocolSpec::acp(), messages, false, None)
}

#[test]
fn test_second_prompt_is_flagged_at_ordinal_one() {
    let mut messages = session_preamble("s1");
    messages.push(prompt("s1", "first"));
    messages.push(prompt("s1", "second"));
    let second_at = messages.len() - 1;

    let report = validate(messages);

    let protocol: Vec<_> = report.findings_with_code("PROTOCOL.PROMPT_ALREADY_IN_FLIGHT").collect();
    assert_eq!(protocol.len(), 1);
    assert_eq!(protocol[0].lane, Lane::Protocol);
    assert_eq!(protocol[0].trace_index, Some(second_at));

    let session: Vec<_> = report.findings_with_code(MULTIPLE_PROMPTS_IN_FLIGHT).collect();
    assert_eq!(session.len(), 1);
    assert_eq!(
        session[0].subject,
        Subject::PromptTurn(SessionId::new("s1"), 1)
    );
    assert_eq!(session[0].trace_index, Some(second_at));
    assert!(report.final_phase.is_ok());
}

#[rstest]
#[case::end_turn(StopReason::EndTurn, true)]
#[case::max_tokens(StopReason::MaxTokens, true)]
#[case::cancelled(StopReason::Cancelled, false)]
fn test_cancel_mismatch(#[case] stop_reason: StopReason, #[case] flagged: bool) {
    let mut messages = session_preamble("s1");
    messages.push(prompt("s1", "go"));
    messages.push(cancel("s1"));
    messages.push(prompt_result("s1", stop_reason));

    let report = validate(messages);
    assert_eq!(report.findings_with_code(CANCEL_MISMATCH).count() == 1, flagged);
    assert!(report.findings_with_code(CANCEL_MISMATCH).all(|f| f.lane == Lane::Session));
}

#[rstest]
#[case::bogus("bogus", true)]
#[case::plan("plan", false)]
#[case::default("default", false)]
fn test_mode_validity(#[case] mode_id: &str, #[case] flagged: bool) {
    let mut messages = handshake();
    messages.push(new_session_request());
    messages.push(new_session_result("s1", Some(modes("default", &["default", "plan"]))));
    messages.push(set_mode("s1", mode_id));

    let report = validate(messages);
    let findings: Vec<_> = report.findings_with_code(INVALID_MODE_ID).collect();
    assert_eq!(findings.len(), usize::from(flagged));
    if flagged {
        assert_eq!(findings[0].severity, Severity::Error);
    }
}

#[test]
fn test_mode_update_follows_advertised_state() {
    let mut messages = handshake();
    messages.push(new_session_request());
    messages.push(new_session_result("s1", Some(modes("default", &["default", "plan"]))));
    messages.push(set_mode("s1", "plan"));
    messages.push(mode_set("s1", "plan"));
    messages.push(mode_update("s1", "default"));
    messages.push(mode_update("s1", "review"));

    let report = validate(messages);
    let findings: Vec<_> = report
        .findings_with_code(CURRENT_MODE_NOT_IN_AVAILABLE_MODES)
        .collect();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].trace_index, Some(7));

    let phase = report.final_phase.unwrap();
    let session = phase.context().unwrap().session(&SessionId::new("s1")).unwrap();
    assert_eq!(
        session.modes.as_ref().map(|m| m.current_mode_id.as_str()),
        Some("review")
    );
}

#[test]
fn test_stop_on_first_error_keeps_later_lanes() {
    let mut messages = session_preamble("s1");
    messages.push(prompt("s1", "first"));
    messages.push(prompt("s1", "second"));
    messages.push(prompt_result("s1", StopReason::EndTurn));

    let report = validation::run("s1", &ProtocolSpec::acp(), messages, true, None);
    assert!(report.final_phase.is_err());
    assert_eq!(report.trace.len(), 7);
    assert_eq!(report.findings_with_code(MULTIPLE_PROMPTS_IN_FLIGHT).count(), 1);
    assert!(report
        .findings
        .iter()
        .any(|f| f.lane == Lane::Implementation && f.severity == Severity::Info));
}

#[test]
fn test_profile_and_judges_run_on_every_message() {
    let mut messages = session_preamble("s1");
    messages.push(prompt("s1", "   "));
    messages.push(agent_says("s1", "ok"));
    messages.push(prompt_result("s1", StopReason::EndTurn));

    let options = ValidationOptions::new()
        .with_domain_profile(DomainProfile::new(MetadataPolicy::Disallow).with_max_message_bytes(90))
        .with_eval_profile(EvalProfile::standard());
    let report = validation::run_with("s1", &ProtocolSpec::acp(), messages, &options);

    assert!(report.findings.iter().any(|f| f.lane == Lane::Eval));
    assert!(report
        .findings_with_code("TRANSPORT.MESSAGE_TOO_LARGE")
        .all(|f| f.lane == Lane::Transport));
    assert!(report.final_phase.unwrap().is_ready());
}

#[test]
fn test_jsonl_trace_replay() {
    let input = concat!(
        r#"{"from":"client","frame":{"jsonrpc":"2.0","id":0,"method":"initialize","params":{"protocolVersion":1}}}"#,
        "\n",
        r#"{"from":"agent","frame":{"jsonrpc":"2.0","id":0,"result":{"protocolVersion":1}}}"#,
        "\n",
        r#"{"from":"client","frame":{"jsonrpc":"2.0","id":1,"method":"session/new","params":{"cwd":"/w","mcpServers":[]}}}"#,
        "\n",
        r#"{"from":"agent","frame":{"jsonrpc":"2.0","id":1,"result":{"sessionId":"s1"}}}"#,
        "\n",
        r#"{"from":"client","frame":{"jsonrpc":"2.0","id":2,"method":"session/prompt","params":{"sessionId":"s1","prompt":[{"type":"text","text":"hi"}]}}}"#,
        "\n",
        r#"{"from":"client","frame":{"jsonrpc":"2.0","method":"session/cancel","params":{"sessionId":"s1"}}}"#,
        "\n",
        r#"{"from":"agent","frame":{"jsonrpc":"2.0","id":2,"result":{"stopReason":"end_turn"}}}"#,
        "\n",
    );

    let trace = decode_jsonl(input);
    assert!(trace.findings.is_empty());
    let report = validation::run("s1", &ProtocolSpec::acp(), trace.messages, false, None);
    let codes: Vec<_> = report.findings.iter().filter_map(|f| f.code()).collect();
    assert_eq!(codes, vec![CANCEL_MISMATCH]);
}
