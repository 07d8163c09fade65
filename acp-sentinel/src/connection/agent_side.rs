//! Agent end of a live connection

use super::core::{ConnectionCore, Dispatch};
use super::handlers::Agent;
use super::{unexpected_response, ConnectionOptions};
use crate::error::{JsonRpcError, Result};
use crate::message::{Direction, FromAgent, FromClient, Message, ModeSetResult, SessionScoped};
use crate::protocol::Phase;
use crate::schema::*;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Connection held by an agent serving a client
pub struct AgentSideConnection {
    core: Arc<ConnectionCore>,
}

impl AgentSideConnection {
    /// Start serving `agent` over `transport`.
    ///
    /// Spawns the read loop on the current tokio runtime.
    pub fn new<A, T>(agent: A, transport: T, options: ConnectionOptions) -> Self
    where
        A: Agent + 'static,
        T: Transport + 'static,
    {
        let dispatch = Arc::new(AgentDispatch {
            agent: Arc::new(agent),
        });
        Self {
            core: ConnectionCore::start(
                Direction::FromAgent,
                Arc::new(transport),
                dispatch,
                options,
            ),
        }
    }

    pub async fn read_text_file(&self, request: ReadTextFileRequest) -> Result<ReadTextFileResponse> {
        match self
            .core
            .request(FromAgent::ReadTextFileRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::ReadTextFileResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::FS_READ_TEXT_FILE, other)),
        }
    }

    pub async fn write_text_file(
        &self,
        request: WriteTextFileRequest,
    ) -> Result<WriteTextFileResponse> {
        match self
            .core
            .request(FromAgent::WriteTextFileRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::WriteTextFileResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::FS_WRITE_TEXT_FILE, other)),
        }
    }

    /// Ask the user to approve a tool call; only legal while a prompt is in flight
    pub async fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> Result<RequestPermissionResponse> {
        match self
            .core
            .request(FromAgent::RequestPermissionRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::RequestPermissionResult(scoped)) => {
                Ok(scoped.response)
            }
            other => Err(unexpected_response(methods::SESSION_REQUEST_PERMISSION, other)),
        }
    }

    pub async fn create_terminal(
        &self,
        request: CreateTerminalRequest,
    ) -> Result<CreateTerminalResponse> {
        match self
            .core
            .request(FromAgent::CreateTerminalRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::CreateTerminalResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::TERMINAL_CREATE, other)),
        }
    }

    pub async fn terminal_output(&self, request: TerminalRequest) -> Result<TerminalOutputResponse> {
        match self
            .core
            .request(FromAgent::TerminalOutputRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::TerminalOutputResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::TERMINAL_OUTPUT, other)),
        }
    }

    pub async fn wait_for_terminal_exit(
        &self,
        request: TerminalRequest,
    ) -> Result<WaitForTerminalExitResponse> {
        match self
            .core
            .request(FromAgent::WaitForTerminalExitRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::WaitForTerminalExitResult(scoped)) => {
                Ok(scoped.response)
            }
            other => Err(unexpected_response(methods::TERMINAL_WAIT_FOR_EXIT, other)),
        }
    }

    pub async fn kill_terminal(&self, request: TerminalRequest) -> Result<KillTerminalResponse> {
        match self
            .core
            .request(FromAgent::KillTerminalRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::KillTerminalResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::TERMINAL_KILL, other)),
        }
    }

    pub async fn release_terminal(
        &self,
        request: TerminalRequest,
    ) -> Result<ReleaseTerminalResponse> {
        match self
            .core
            .request(FromAgent::ReleaseTerminalRequest(request).into())
            .await?
        {
            Message::FromClient(FromClient::ReleaseTerminalResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::TERMINAL_RELEASE, other)),
        }
    }

    /// Stream one `session/update` to the client
    pub async fn session_notification(&self, notification: SessionNotification) -> Result<()> {
        self.core
            .notify(FromAgent::SessionUpdate(notification).into())
            .await
    }

    pub async fn ext_method(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        let method = method.into();
        match self
            .core
            .request(FromAgent::ExtRequest { method, params }.into())
            .await?
        {
            Message::FromClient(FromClient::ExtResponse { result, .. }) => Ok(result),
            other => Err(unexpected_response("extension", other)),
        }
    }

    pub async fn ext_notification(&self, method: impl Into<String>, params: Value) -> Result<()> {
        let method = method.into();
        self.core
            .notify(FromAgent::ExtNotification { method, params }.into())
            .await
    }

    pub async fn phase(&self) -> Option<Phase> {
        self.core.phase().await
    }

    pub async fn pending_requests(&self) -> usize {
        self.core.pending_count().await
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub async fn close(&self) {
        self.core.close().await
    }
}

impl Drop for AgentSideConnection {
    fn drop(&mut self) {
        self.core.shut_down_in_background();
    }
}

struct AgentDispatch<A> {
    agent: Arc<A>,
}

#[async_trait]
impl<A: Agent + 'static> Dispatch for AgentDispatch<A> {
    async fn request(&self, message: Message) -> std::result::Result<Message, JsonRpcError> {
        let Message::FromClient(request) = message else {
            return Err(JsonRpcError::internal_error("agent received its own message"));
        };

        let response = match request {
            FromClient::InitializeRequest(r) => {
                FromAgent::InitializeResult(self.agent.initialize(r).await?)
            }
            FromClient::AuthenticateRequest(r) => {
                FromAgent::AuthenticateResult(self.agent.authenticate(r).await?)
            }
            FromClient::SessionNewRequest(r) => {
                FromAgent::SessionNewResult(self.agent.new_session(r).await?)
            }
            FromClient::SessionLoadRequest(r) => {
                let session_id = r.session_id.clone();
                let response = self.agent.load_session(r).await?;
                FromAgent::SessionLoadResult(SessionScoped::new(session_id, response))
            }
            FromClient::SessionPromptRequest(r) => {
                let session_id = r.session_id.clone();
                let response = self.agent.prompt(r).await?;
                FromAgent::SessionPromptResult(SessionScoped::new(session_id, response))
            }
            FromClient::SessionSetModeRequest(r) => {
                let (session_id, mode_id) = (r.session_id.clone(), r.mode_id.clone());
                let response = self.agent.set_session_mode(r).await?;
                FromAgent::SessionSetModeResult(ModeSetResult {
                    session_id,
                    mode_id,
                    response,
                })
            }
            FromClient::ExtRequest { method, params } => {
                let result = self.agent.ext_method(method.clone(), params).await?;
                FromAgent::ExtResponse { method, result }
            }
            other => return Err(JsonRpcError::method_not_found(other.method())),
        };
        Ok(response.into())
    }

    async fn notification(&self, message: Message) {
        match message {
            Message::FromClient(FromClient::SessionCancel(notification)) => {
                self.agent.cancel(notification).await
            }
            Message::FromClient(FromClient::ExtNotification { method, params }) => {
                self.agent.ext_notification(method, params).await
            }
            other => tracing::warn!("[connection] agent ignored {}", other),
        }
    }
}
