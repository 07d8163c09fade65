//! Structured validation findings

use crate::message::Message;
use crate::schema::{SessionId, ToolCallId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validation category a finding belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Protocol,
    Session,
    ToolSurface,
    Transport,
    Eval,
    Implementation,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lane::Protocol => "protocol",
            Lane::Session => "session",
            Lane::ToolSurface => "tool_surface",
            Lane::Transport => "transport",
            Lane::Eval => "eval",
            Lane::Implementation => "implementation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(name)
    }
}

/// What a finding is about
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Connection,
    Session(SessionId),
    /// Zero-based prompt ordinal within the session
    PromptTurn(SessionId, usize),
    MessageAt(usize, Box<Message>),
    ToolCall(ToolCallId),
}

impl Subject {
    pub fn message_at(index: usize, message: &Message) -> Self {
        Subject::MessageAt(index, Box::new(message.clone()))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Connection => f.write_str("connection"),
            Subject::Session(id) => write!(f, "session {}", id),
            Subject::PromptTurn(id, ordinal) => write!(f, "session {} prompt #{}", id, ordinal),
            Subject::MessageAt(index, message) => write!(f, "message {} ({})", index, message),
            Subject::ToolCall(id) => write!(f, "tool call {}", id),
        }
    }
}

/// Stable code plus human-readable description of a violation
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub code: String,
    pub message: String,
    pub subject: Subject,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFinding {
    pub lane: Lane,
    pub severity: Severity,
    pub subject: Subject,
    pub failure: Option<Failure>,
    pub session_id: Option<SessionId>,
    pub trace_index: Option<usize>,
    pub note: Option<String>,
}

impl ValidationFinding {
    /// A finding backed by a coded failure about `subject`
    pub fn new(
        lane: Lane,
        severity: Severity,
        code: impl Into<String>,
        message: impl Into<String>,
        subject: Subject,
    ) -> Self {
        let session_id = match &subject {
            Subject::Session(id) | Subject::PromptTurn(id, _) => Some(id.clone()),
            _ => None,
        };
        Self {
            lane,
            severity,
            failure: Some(Failure {
                code: code.into(),
                message: message.into(),
                subject: subject.clone(),
            }),
            subject,
            session_id,
            trace_index: None,
            note: None,
        }
    }

    /// A free-text observation with no coded failure
    pub fn observation(lane: Lane, severity: Severity, subject: Subject, note: impl Into<String>) -> Self {
        Self {
            lane,
            severity,
            subject,
            failure: None,
            session_id: None,
            trace_index: None,
            note: Some(note.into()),
        }
    }

    pub fn with_session(mut self, session_id: Option<&SessionId>) -> Self {
        if let Some(id) = session_id {
            self.session_id = Some(id.clone());
        }
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.trace_index = Some(index);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn code(&self) -> Option<&str> {
        self.failure.as_ref().map(|f| f.code.as_str())
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.severity, self.lane, self.subject)?;
        if let Some(failure) = &self.failure {
            write!(f, ": {} {}", failure.code, failure.message)?;
        }
        if let Some(note) = &self.note {
            write!(f, " ({})", note)?;
        }
        Ok(())
    }
}
