//! Correlation tables of in-flight requests

use crate::message::{FromAgent, FromClient};
use crate::schema::methods;
use crate::schema::{RequestId, SessionId, SessionModeId, TerminalId};
use std::collections::HashMap;

/// What a client asked the agent, kept until the agent answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingClientRequest {
    Initialize,
    Authenticate,
    SessionNew,
    SessionLoad(SessionId),
    SessionPrompt(SessionId),
    SessionSetMode {
        session_id: SessionId,
        mode_id: SessionModeId,
    },
    Ext(String),
}

impl PendingClientRequest {
    /// Descriptor for an outgoing client request, `None` for anything else
    pub fn for_message(message: &FromClient) -> Option<Self> {
        let pending = match message {
            FromClient::InitializeRequest(_) => PendingClientRequest::Initialize,
            FromClient::AuthenticateRequest(_) => PendingClientRequest::Authenticate,
            FromClient::SessionNewRequest(_) => PendingClientRequest::SessionNew,
            FromClient::SessionLoadRequest(r) => {
                PendingClientRequest::SessionLoad(r.session_id.clone())
            }
            FromClient::SessionPromptRequest(r) => {
                PendingClientRequest::SessionPrompt(r.session_id.clone())
            }
            FromClient::SessionSetModeRequest(r) => PendingClientRequest::SessionSetMode {
                session_id: r.session_id.clone(),
                mode_id: r.mode_id.clone(),
            },
            FromClient::ExtRequest { method, .. } => PendingClientRequest::Ext(method.clone()),
            _ => return None,
        };
        Some(pending)
    }

    pub fn method(&self) -> &str {
        match self {
            PendingClientRequest::Initialize => methods::INITIALIZE,
            PendingClientRequest::Authenticate => methods::AUTHENTICATE,
            PendingClientRequest::SessionNew => methods::SESSION_NEW,
            PendingClientRequest::SessionLoad(_) => methods::SESSION_LOAD,
            PendingClientRequest::SessionPrompt(_) => methods::SESSION_PROMPT,
            PendingClientRequest::SessionSetMode { .. } => methods::SESSION_SET_MODE,
            PendingClientRequest::Ext(method) => method,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            PendingClientRequest::SessionLoad(id) | PendingClientRequest::SessionPrompt(id) => {
                Some(id)
            }
            PendingClientRequest::SessionSetMode { session_id, .. } => Some(session_id),
            _ => None,
        }
    }
}

/// What an agent asked the client, kept until the client answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAgentRequest {
    ReadTextFile(SessionId),
    WriteTextFile(SessionId),
    RequestPermission(SessionId),
    CreateTerminal(SessionId),
    TerminalOutput {
        session_id: SessionId,
        terminal_id: TerminalId,
    },
    WaitForTerminalExit {
        session_id: SessionId,
        terminal_id: TerminalId,
    },
    KillTerminal {
        session_id: SessionId,
        terminal_id: TerminalId,
    },
    ReleaseTerminal {
        session_id: SessionId,
        terminal_id: TerminalId,
    },
    Ext(String),
}

impl PendingAgentRequest {
    pub fn for_message(message: &FromAgent) -> Option<Self> {
        let pending = match message {
            FromAgent::ReadTextFileRequest(r) => {
                PendingAgentRequest::ReadTextFile(r.session_id.clone())
            }
            FromAgent::WriteTextFileRequest(r) => {
                PendingAgentRequest::WriteTextFile(r.session_id.clone())
            }
            FromAgent::RequestPermissionRequest(r) => {
                PendingAgentRequest::RequestPermission(r.session_id.clone())
            }
            FromAgent::CreateTerminalRequest(r) => {
                PendingAgentRequest::CreateTerminal(r.session_id.clone())
            }
            FromAgent::TerminalOutputRequest(r) => PendingAgentRequest::TerminalOutput {
                session_id: r.session_id.clone(),
                terminal_id: r.terminal_id.clone(),
            },
            FromAgent::WaitForTerminalExitRequest(r) => PendingAgentRequest::WaitForTerminalExit {
                session_id: r.session_id.clone(),
                terminal_id: r.terminal_id.clone(),
            },
            FromAgent::KillTerminalRequest(r) => PendingAgentRequest::KillTerminal {
                session_id: r.session_id.clone(),
                terminal_id: r.terminal_id.clone(),
            },
            FromAgent::ReleaseTerminalRequest(r) => PendingAgentRequest::ReleaseTerminal {
                session_id: r.session_id.clone(),
                terminal_id: r.terminal_id.clone(),
            },
            FromAgent::ExtRequest { method, .. } => PendingAgentRequest::Ext(method.clone()),
            _ => return None,
        };
        Some(pending)
    }

    pub fn method(&self) -> &str {
        match self {
            PendingAgentRequest::ReadTextFile(_) => methods::FS_READ_TEXT_FILE,
            PendingAgentRequest::WriteTextFile(_) => methods::FS_WRITE_TEXT_FILE,
            PendingAgentRequest::RequestPermission(_) => methods::SESSION_REQUEST_PERMISSION,
            PendingAgentRequest::CreateTerminal(_) => methods::TERMINAL_CREATE,
            PendingAgentRequest::TerminalOutput { .. } => methods::TERMINAL_OUTPUT,
            PendingAgentRequest::WaitForTerminalExit { .. } => methods::TERMINAL_WAIT_FOR_EXIT,
            PendingAgentRequest::KillTerminal { .. } => methods::TERMINAL_KILL,
            PendingAgentRequest::ReleaseTerminal { .. } => methods::TERMINAL_RELEASE,
            PendingAgentRequest::Ext(method) => method,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            PendingAgentRequest::ReadTextFile(id)
            | PendingAgentRequest::WriteTextFile(id)
            | PendingAgentRequest::RequestPermission(id)
            | PendingAgentRequest::CreateTerminal(id) => Some(id),
            PendingAgentRequest::TerminalOutput { session_id, .. }
            | PendingAgentRequest::WaitForTerminalExit { session_id, .. }
            | PendingAgentRequest::KillTerminal { session_id, .. }
            | PendingAgentRequest::ReleaseTerminal { session_id, .. } => Some(session_id),
            PendingAgentRequest::Ext(_) => None,
        }
    }
}

/// Outstanding requests of one connection, keyed by wire id
///
/// Ids are unique per direction: a client request and an agent request may
/// legitimately share an id because each peer allocates its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodecState {
    pub pending_client_requests: HashMap<RequestId, PendingClientRequest>,
    pub pending_agent_requests: HashMap<RequestId, PendingAgentRequest>,
}

impl CodecState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pending_client_requests.is_empty() && self.pending_agent_requests.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending_client_requests.len() + self.pending_agent_requests.len()
    }
}
