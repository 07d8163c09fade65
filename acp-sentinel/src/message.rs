//! Typed message model
//!
//! Every frame that crosses an ACP connection decodes into one [`Message`].
//! The outer enum records who sent it; the inner enums name the method and
//! carry the typed payload. Results whose wire body omits context the caller
//! needs (the session a prompt belonged to, the terminal an output came from)
//! carry that context explicitly, restored by the codec from its pending table.

use crate::codec::pending::{PendingAgentRequest, PendingClientRequest};
use crate::error::JsonRpcError;
use crate::schema::*;
use serde_json::Value;
use std::fmt;

/// Which peer produced a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    FromClient,
    FromAgent,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::FromClient => Direction::FromAgent,
            Direction::FromAgent => Direction::FromClient,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromClient => f.write_str("from client"),
            Direction::FromAgent => f.write_str("from agent"),
        }
    }
}

/// JSON-RPC frame shape of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
}

/// A result restored with the session it answers for
#[derive(Debug, Clone, PartialEq)]
pub struct SessionScoped<T> {
    pub session_id: SessionId,
    pub response: T,
}

impl<T> SessionScoped<T> {
    pub fn new(session_id: impl Into<SessionId>, response: T) -> Self {
        Self {
            session_id: session_id.into(),
            response,
        }
    }
}

/// A result restored with the terminal it answers for
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalScoped<T> {
    pub session_id: SessionId,
    pub terminal_id: TerminalId,
    pub response: T,
}

impl<T> TerminalScoped<T> {
    pub fn new(
        session_id: impl Into<SessionId>,
        terminal_id: impl Into<TerminalId>,
        response: T,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            terminal_id: terminal_id.into(),
            response,
        }
    }
}

/// `session/set_mode` result restored with the requested mode
#[derive(Debug, Clone, PartialEq)]
pub struct ModeSetResult {
    pub session_id: SessionId,
    pub mode_id: SessionModeId,
    pub response: SetSessionModeResponse,
}

/// Messages sent by the client
#[derive(Debug, Clone, PartialEq)]
pub enum FromClient {
    InitializeRequest(InitializeRequest),
    AuthenticateRequest(AuthenticateRequest),
    SessionNewRequest(NewSessionRequest),
    SessionLoadRequest(LoadSessionRequest),
    SessionPromptRequest(PromptRequest),
    SessionSetModeRequest(SetSessionModeRequest),
    SessionCancel(CancelNotification),

    ReadTextFileResult(SessionScoped<ReadTextFileResponse>),
    WriteTextFileResult(SessionScoped<WriteTextFileResponse>),
    RequestPermissionResult(SessionScoped<RequestPermissionResponse>),
    CreateTerminalResult(SessionScoped<CreateTerminalResponse>),
    TerminalOutputResult(TerminalScoped<TerminalOutputResponse>),
    WaitForTerminalExitResult(TerminalScoped<WaitForTerminalExitResponse>),
    KillTerminalResult(TerminalScoped<KillTerminalResponse>),
    ReleaseTerminalResult(TerminalScoped<ReleaseTerminalResponse>),

    /// Error response to an agent request
    AgentRequestError {
        request: PendingAgentRequest,
        error: JsonRpcError,
    },

    ExtRequest { method: String, params: Value },
    ExtNotification { method: String, params: Value },
    ExtResponse { method: String, result: Value },
}

impl FromClient {
    /// Method of the request, notification, or answered request
    pub fn method(&self) -> &str {
        match self {
            FromClient::InitializeRequest(_) => methods::INITIALIZE,
            FromClient::AuthenticateRequest(_) => methods::AUTHENTICATE,
            FromClient::SessionNewRequest(_) => methods::SESSION_NEW,
            FromClient::SessionLoadRequest(_) => methods::SESSION_LOAD,
            FromClient::SessionPromptRequest(_) => methods::SESSION_PROMPT,
            FromClient::SessionSetModeRequest(_) => methods::SESSION_SET_MODE,
            FromClient::SessionCancel(_) => methods::SESSION_CANCEL,
            FromClient::ReadTextFileResult(_) => methods::FS_READ_TEXT_FILE,
            FromClient::WriteTextFileResult(_) => methods::FS_WRITE_TEXT_FILE,
            FromClient::RequestPermissionResult(_) => methods::SESSION_REQUEST_PERMISSION,
            FromClient::CreateTerminalResult(_) => methods::TERMINAL_CREATE,
            FromClient::TerminalOutputResult(_) => methods::TERMINAL_OUTPUT,
            FromClient::WaitForTerminalExitResult(_) => methods::TERMINAL_WAIT_FOR_EXIT,
            FromClient::KillTerminalResult(_) => methods::TERMINAL_KILL,
            FromClient::ReleaseTerminalResult(_) => methods::TERMINAL_RELEASE,
            FromClient::AgentRequestError { request, .. } => request.method(),
            FromClient::ExtRequest { method, .. }
            | FromClient::ExtNotification { method, .. }
            | FromClient::ExtResponse { method, .. } => method,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            FromClient::InitializeRequest(_)
            | FromClient::AuthenticateRequest(_)
            | FromClient::SessionNewRequest(_)
            | FromClient::SessionLoadRequest(_)
            | FromClient::SessionPromptRequest(_)
            | FromClient::SessionSetModeRequest(_)
            | FromClient::ExtRequest { .. } => MessageKind::Request,
            FromClient::SessionCancel(_) | FromClient::ExtNotification { .. } => {
                MessageKind::Notification
            }
            _ => MessageKind::Response,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            FromClient::SessionLoadRequest(r) => Some(&r.session_id),
            FromClient::SessionPromptRequest(r) => Some(&r.session_id),
            FromClient::SessionSetModeRequest(r) => Some(&r.session_id),
            FromClient::SessionCancel(n) => Some(&n.session_id),
            FromClient::ReadTextFileResult(r) => Some(&r.session_id),
            FromClient::WriteTextFileResult(r) => Some(&r.session_id),
            FromClient::RequestPermissionResult(r) => Some(&r.session_id),
            FromClient::CreateTerminalResult(r) => Some(&r.session_id),
            FromClient::TerminalOutputResult(r) => Some(&r.session_id),
            FromClient::WaitForTerminalExitResult(r) => Some(&r.session_id),
            FromClient::KillTerminalResult(r) => Some(&r.session_id),
            FromClient::ReleaseTerminalResult(r) => Some(&r.session_id),
            FromClient::AgentRequestError { request, .. } => request.session_id(),
            FromClient::InitializeRequest(_)
            | FromClient::AuthenticateRequest(_)
            | FromClient::SessionNewRequest(_)
            | FromClient::ExtRequest { .. }
            | FromClient::ExtNotification { .. }
            | FromClient::ExtResponse { .. } => None,
        }
    }
}

/// Messages sent by the agent
#[derive(Debug, Clone, PartialEq)]
pub enum FromAgent {
    InitializeResult(InitializeResponse),
    AuthenticateResult(AuthenticateResponse),
    SessionNewResult(NewSessionResponse),
    SessionLoadResult(SessionScoped<LoadSessionResponse>),
    SessionPromptResult(SessionScoped<PromptResponse>),
    SessionSetModeResult(ModeSetResult),
    SessionUpdate(SessionNotification),

    ReadTextFileRequest(ReadTextFileRequest),
    WriteTextFileRequest(WriteTextFileRequest),
    RequestPermissionRequest(RequestPermissionRequest),
    CreateTerminalRequest(CreateTerminalRequest),
    TerminalOutputRequest(TerminalRequest),
    WaitForTerminalExitRequest(TerminalRequest),
    KillTerminalRequest(TerminalRequest),
    ReleaseTerminalRequest(TerminalRequest),

    /// Error response to a client request
    ClientRequestError {
        request: PendingClientRequest,
        error: JsonRpcError,
    },

    ExtRequest { method: String, params: Value },
    ExtNotification { method: String, params: Value },
    ExtResponse { method: String, result: Value },
}

impl FromAgent {
    pub fn method(&self) -> &str {
        match self {
            FromAgent::InitializeResult(_) => methods::INITIALIZE,
            FromAgent::AuthenticateResult(_) => methods::AUTHENTICATE,
            FromAgent::SessionNewResult(_) => methods::SESSION_NEW,
            FromAgent::SessionLoadResult(_) => methods::SESSION_LOAD,
            FromAgent::SessionPromptResult(_) => methods::SESSION_PROMPT,
            FromAgent::SessionSetModeResult(_) => methods::SESSION_SET_MODE,
            FromAgent::SessionUpdate(_) => methods::SESSION_UPDATE,
            FromAgent::ReadTextFileRequest(_) => methods::FS_READ_TEXT_FILE,
            FromAgent::WriteTextFileRequest(_) => methods::FS_WRITE_TEXT_FILE,
            FromAgent::RequestPermissionRequest(_) => methods::SESSION_REQUEST_PERMISSION,
            FromAgent::CreateTerminalRequest(_) => methods::TERMINAL_CREATE,
            FromAgent::TerminalOutputRequest(_) => methods::TERMINAL_OUTPUT,
            FromAgent::WaitForTerminalExitRequest(_) => methods::TERMINAL_WAIT_FOR_EXIT,
            FromAgent::KillTerminalRequest(_) => methods::TERMINAL_KILL,
            FromAgent::ReleaseTerminalRequest(_) => methods::TERMINAL_RELEASE,
            FromAgent::ClientRequestError { request, .. } => request.method(),
            FromAgent::ExtRequest { method, .. }
            | FromAgent::ExtNotification { method, .. }
            | FromAgent::ExtResponse { method, .. } => method,
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            FromAgent::ReadTextFileRequest(_)
            | FromAgent::WriteTextFileRequest(_)
            | FromAgent::RequestPermissionRequest(_)
            | FromAgent::CreateTerminalRequest(_)
            | FromAgent::TerminalOutputRequest(_)
            | FromAgent::WaitForTerminalExitRequest(_)
            | FromAgent::KillTerminalRequest(_)
            | FromAgent::ReleaseTerminalRequest(_)
            | FromAgent::ExtRequest { .. } => MessageKind::Request,
            FromAgent::SessionUpdate(_) | FromAgent::ExtNotification { .. } => {
                MessageKind::Notification
            }
            _ => MessageKind::Response,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            FromAgent::SessionNewResult(r) => Some(&r.session_id),
            FromAgent::SessionLoadResult(r) => Some(&r.session_id),
            FromAgent::SessionPromptResult(r) => Some(&r.session_id),
            FromAgent::SessionSetModeResult(r) => Some(&r.session_id),
            FromAgent::SessionUpdate(n) => Some(&n.session_id),
            FromAgent::ReadTextFileRequest(r) => Some(&r.session_id),
            FromAgent::WriteTextFileRequest(r) => Some(&r.session_id),
            FromAgent::RequestPermissionRequest(r) => Some(&r.session_id),
            FromAgent::CreateTerminalRequest(r) => Some(&r.session_id),
            FromAgent::TerminalOutputRequest(r)
            | FromAgent::WaitForTerminalExitRequest(r)
            | FromAgent::KillTerminalRequest(r)
            | FromAgent::ReleaseTerminalRequest(r) => Some(&r.session_id),
            FromAgent::ClientRequestError { request, .. } => request.session_id(),
            FromAgent::InitializeResult(_)
            | FromAgent::AuthenticateResult(_)
            | FromAgent::ExtRequest { .. }
            | FromAgent::ExtNotification { .. }
            | FromAgent::ExtResponse { .. } => None,
        }
    }
}

/// One decoded frame, tagged with its sender
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    FromClient(FromClient),
    FromAgent(FromAgent),
}

impl Message {
    pub fn direction(&self) -> Direction {
        match self {
            Message::FromClient(_) => Direction::FromClient,
            Message::FromAgent(_) => Direction::FromAgent,
        }
    }

    pub fn method(&self) -> &str {
        match self {
            Message::FromClient(m) => m.method(),
            Message::FromAgent(m) => m.method(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::FromClient(m) => m.kind(),
            Message::FromAgent(m) => m.kind(),
        }
    }

    /// Session the message names, directly or through its pending request
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Message::FromClient(m) => m.session_id(),
            Message::FromAgent(m) => m.session_id(),
        }
    }

    pub fn is_extension(&self) -> bool {
        matches!(
            self,
            Message::FromClient(
                FromClient::ExtRequest { .. }
                    | FromClient::ExtNotification { .. }
                    | FromClient::ExtResponse { .. }
            ) | Message::FromAgent(
                FromAgent::ExtRequest { .. }
                    | FromAgent::ExtNotification { .. }
                    | FromAgent::ExtResponse { .. }
            )
        )
    }

    /// Content blocks carried by prompts, session updates and permission requests
    pub fn content_blocks(&self) -> Vec<&ContentBlock> {
        match self {
            Message::FromClient(FromClient::SessionPromptRequest(request)) => {
                request.prompt.iter().collect()
            }
            Message::FromAgent(FromAgent::SessionUpdate(notification)) => {
                notification.update.content_blocks()
            }
            Message::FromAgent(FromAgent::RequestPermissionRequest(request)) => request
                .tool_call
                .content
                .iter()
                .flatten()
                .filter_map(|c| c.content_block())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind() {
            MessageKind::Request => "request",
            MessageKind::Notification => "notification",
            MessageKind::Response => "response",
        };
        write!(f, "{} {} {}", self.method(), kind, self.direction())
    }
}

impl From<FromClient> for Message {
    fn from(message: FromClient) -> Self {
        Message::FromClient(message)
    }
}

impl From<FromAgent> for Message {
    fn from(message: FromAgent) -> Self {
        Message::FromAgent(message)
    }
}
