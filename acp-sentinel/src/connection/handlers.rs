//! Handler traits implemented by the two peers
//!
//! An [`Agent`] answers the requests a client sends; a [`Client`] answers the
//! requests an agent sends. Optional capabilities default to
//! `Method not found` so a handler only implements what it advertises.

use crate::error::JsonRpcError;
use crate::schema::methods;
use crate::schema::*;
use async_trait::async_trait;
use serde_json::Value;

pub type HandlerResult<T> = Result<T, JsonRpcError>;

/// Agent side of the protocol, driven by an [`AgentSideConnection`](super::AgentSideConnection)
#[async_trait]
pub trait Agent: Send + Sync {
    async fn initialize(&self, request: InitializeRequest) -> HandlerResult<InitializeResponse>;

    async fn authenticate(&self, _request: AuthenticateRequest) -> HandlerResult<AuthenticateResponse> {
        Err(JsonRpcError::method_not_found(methods::AUTHENTICATE))
    }

    async fn new_session(&self, request: NewSessionRequest) -> HandlerResult<NewSessionResponse>;

    async fn load_session(&self, _request: LoadSessionRequest) -> HandlerResult<LoadSessionResponse> {
        Err(JsonRpcError::method_not_found(methods::SESSION_LOAD))
    }

    async fn prompt(&self, request: PromptRequest) -> HandlerResult<PromptResponse>;

    /// `session/cancel`; the running prompt should end with `cancelled`
    async fn cancel(&self, notification: CancelNotification);

    async fn set_session_mode(
        &self,
        _request: SetSessionModeRequest,
    ) -> HandlerResult<SetSessionModeResponse> {
        Err(JsonRpcError::method_not_found(methods::SESSION_SET_MODE))
    }

    async fn ext_method(&self, method: String, _params: Value) -> HandlerResult<Value> {
        Err(JsonRpcError::method_not_found(&method))
    }

    async fn ext_notification(&self, method: String, _params: Value) {
        tracing::debug!("ignoring extension notification {}", method);
    }
}

/// Client side of the protocol, driven by a [`ClientSideConnection`](super::ClientSideConnection)
#[async_trait]
pub trait Client: Send + Sync {
    async fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> HandlerResult<RequestPermissionResponse>;

    /// `session/update`, delivered in arrival order
    async fn session_notification(&self, notification: SessionNotification);

    async fn read_text_file(&self, _request: ReadTextFileRequest) -> HandlerResult<ReadTextFileResponse> {
        Err(JsonRpcError::method_not_found(methods::FS_READ_TEXT_FILE))
    }

    async fn write_text_file(
        &self,
        _request: WriteTextFileRequest,
    ) -> HandlerResult<WriteTextFileResponse> {
        Err(JsonRpcError::method_not_found(methods::FS_WRITE_TEXT_FILE))
    }

    async fn create_terminal(
        &self,
        _request: CreateTerminalRequest,
    ) -> HandlerResult<CreateTerminalResponse> {
        Err(JsonRpcError::method_not_found(methods::TERMINAL_CREATE))
    }

    async fn terminal_output(&self, _request: TerminalRequest) -> HandlerResult<TerminalOutputResponse> {
        Err(JsonRpcError::method_not_found(methods::TERMINAL_OUTPUT))
    }

    async fn wait_for_terminal_exit(
        &self,
        _request: TerminalRequest,
    ) -> HandlerResult<WaitForTerminalExitResponse> {
        Err(JsonRpcError::method_not_found(methods::TERMINAL_WAIT_FOR_EXIT))
    }

    async fn kill_terminal(&self, _request: TerminalRequest) -> HandlerResult<KillTerminalResponse> {
        Err(JsonRpcError::method_not_found(methods::TERMINAL_KILL))
    }

    async fn release_terminal(
        &self,
        _request: TerminalRequest,
    ) -> HandlerResult<ReleaseTerminalResponse> {
        Err(JsonRpcError::method_not_found(methods::TERMINAL_RELEASE))
    }

    async fn ext_method(&self, method: String, _params: Value) -> HandlerResult<Value> {
        Err(JsonRpcError::method_not_found(&method))
    }

    async fn ext_notification(&self, method: String, _params: Value) {
        tracing::debug!("ignoring extension notification {}", method);
    }
}
