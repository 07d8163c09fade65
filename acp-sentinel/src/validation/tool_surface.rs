//! Tool-surface lane: terminals, tool calls and the sessions they belong to

use super::engine::SessionTrace;
use super::finding::{Lane, Severity, Subject, ValidationFinding};
use crate::message::{FromAgent, FromClient, Message};
use crate::schema::{SessionId, SessionUpdate, TerminalId, TerminalRequest, ToolCallId};
use std::collections::HashSet;

pub const UNKNOWN_TERMINAL: &str = "TOOL.UNKNOWN_TERMINAL";
pub const UNKNOWN_TOOL_CALL: &str = "TOOL.UNKNOWN_TOOL_CALL";
pub const UNKNOWN_SESSION: &str = "TOOL.UNKNOWN_SESSION";

#[derive(Default)]
struct Surface<'a> {
    sessions: HashSet<&'a SessionId>,
    terminals: HashSet<&'a TerminalId>,
    tool_calls: HashSet<&'a ToolCallId>,
}

pub fn check(trace: &SessionTrace) -> Vec<ValidationFinding> {
    let mut surface = Surface::default();
    let mut findings = Vec::new();

    for (index, message) in trace.messages.iter().enumerate() {
        match message {
            Message::FromAgent(FromAgent::SessionNewResult(response)) => {
                surface.sessions.insert(&response.session_id);
            }
            Message::FromAgent(FromAgent::SessionLoadResult(scoped)) => {
                surface.sessions.insert(&scoped.session_id);
            }
            Message::FromClient(FromClient::CreateTerminalResult(scoped)) => {
                surface.terminals.insert(&scoped.response.terminal_id);
            }
            Message::FromClient(FromClient::ReleaseTerminalResult(scoped)) => {
                surface.terminals.remove(&scoped.terminal_id);
            }
            Message::FromAgent(FromAgent::SessionUpdate(notification)) => match &notification.update
            {
                SessionUpdate::ToolCall(call) => {
                    surface.tool_calls.insert(&call.tool_call_id);
                }
                SessionUpdate::ToolCallUpdate(update)
                    if !surface.tool_calls.contains(&update.tool_call_id) =>
                {
                    findings.push(
                        ValidationFinding::new(
                            Lane::ToolSurface,
                            Severity::Warning,
                            UNKNOWN_TOOL_CALL,
                            format!(
                                "update for tool call {} that was never announced",
                                update.tool_call_id
                            ),
                            Subject::ToolCall(update.tool_call_id.clone()),
                        )
                        .with_session(Some(&notification.session_id))
                        .at_index(index),
                    );
                }
                _ => {}
            },
            Message::FromAgent(FromAgent::TerminalOutputRequest(request))
            | Message::FromAgent(FromAgent::WaitForTerminalExitRequest(request))
            | Message::FromAgent(FromAgent::KillTerminalRequest(request))
            | Message::FromAgent(FromAgent::ReleaseTerminalRequest(request)) => {
                surface.check_session(index, message, &request.session_id, &mut findings);
                surface.check_terminal(index, message, request, &mut findings);
            }
            Message::FromAgent(FromAgent::ReadTextFileRequest(_))
            | Message::FromAgent(FromAgent::WriteTextFileRequest(_))
            | Message::FromAgent(FromAgent::CreateTerminalRequest(_)) => {
                if let Some(session_id) = message.session_id() {
                    surface.check_session(index, message, session_id, &mut findings);
                }
            }
            _ => {}
        }
    }

    findings
}

impl Surface<'_> {
    fn check_session(
        &self,
        index: usize,
        message: &Message,
        session_id: &SessionId,
        findings: &mut Vec<ValidationFinding>,
    ) {
        if self.sessions.contains(session_id) {
            return;
        }
        findings.push(
            ValidationFinding::new(
                Lane::ToolSurface,
                Severity::Warning,
                UNKNOWN_SESSION,
                format!("{} names session {} which was never created", message.method(), session_id),
                Subject::message_at(index, message),
            )
            .with_session(Some(session_id))
            .at_index(index),
        );
    }

    fn check_terminal(
        &self,
        index: usize,
        message: &Message,
        request: &TerminalRequest,
        findings: &mut Vec<ValidationFinding>,
    ) {
        if self.terminals.contains(&request.terminal_id) {
            return;
        }
        findings.push(
            ValidationFinding::new(
                Lane::ToolSurface,
                Severity::Error,
                UNKNOWN_TERMINAL,
                format!(
                    "{} names terminal {} which is not open",
                    message.method(),
                    request.terminal_id
                ),
                Subject::message_at(index, message),
            )
            .with_session(Some(&request.session_id))
            .at_index(index),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{SessionScoped, TerminalScoped};
    use crate::schema::*;

    fn created_session() -> Message {
        FromAgent::SessionNewResult(NewSessionResponse {
            session_id: "s1".into(),
            modes: None,
        })
        .into()
    }

    fn terminal_request(terminal: &str) -> TerminalRequest {
        TerminalRequest {
            session_id: "s1".into(),
            terminal_id: terminal.into(),
        }
    }

    fn codes(messages: Vec<Message>) -> Vec<String> {
        let trace = SessionTrace {
            session_id: "s1".into(),
            messages,
        };
        check(&trace)
            .into_iter()
            .filter_map(|f| f.code().map(str::to_string))
            .collect()
    }

    #[test]
    fn test_terminal_lifecycle() {
        let created: Message = FromClient::CreateTerminalResult(SessionScoped::new(
            "s1",
            CreateTerminalResponse {
                terminal_id: "t1".into(),
            },
        ))
        .into();
        let released: Message = FromClient::ReleaseTerminalResult(TerminalScoped::new(
            "s1",
            "t1",
            ReleaseTerminalResponse {},
        ))
        .into();
        let output: Message = FromAgent::TerminalOutputRequest(terminal_request("t1")).into();

        assert!(codes(vec![created_session(), created.clone(), output.clone()]).is_empty());
        assert_eq!(
            codes(vec![created_session(), created, released, output]),
            vec![UNKNOWN_TERMINAL]
        );
    }

    #[test]
    fn test_unknown_tool_call_update() {
        let announce: Message = FromAgent::SessionUpdate(SessionNotification::new(
            "s1",
            SessionUpdate::ToolCall(ToolCall {
                tool_call_id: "call-1".into(),
                title: "Read file".into(),
                kind: ToolKind::Read,
                status: ToolCallStatus::Pending,
                content: vec![],
                locations: vec![],
                raw_input: None,
                raw_output: None,
            }),
        ))
        .into();
        let update = |id: &str| -> Message {
            FromAgent::SessionUpdate(SessionNotification::new(
                "s1",
                SessionUpdate::ToolCallUpdate(ToolCallUpdate::new(id)),
            ))
            .into()
        };
        assert_eq!(
            codes(vec![announce, update("call-1"), update("call-2")]),
            vec![UNKNOWN_TOOL_CALL]
        );
    }

    #[test]
    fn test_fs_request_for_unknown_session() {
        let read: Message = FromAgent::ReadTextFileRequest(ReadTextFileRequest {
            session_id: "ghost".into(),
            path: "/tmp/x".into(),
            line: None,
            limit: None,
        })
        .into();
        assert_eq!(codes(vec![created_session(), read]), vec![UNKNOWN_SESSION]);
    }
}
