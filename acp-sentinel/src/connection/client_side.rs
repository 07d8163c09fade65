//! Client end of a live connection

use super::core::{ConnectionCore, Dispatch};
use super::handlers::Client;
use super::{unexpected_response, ConnectionOptions};
use crate::error::{JsonRpcError, Result};
use crate::message::{Direction, FromAgent, FromClient, Message, SessionScoped, TerminalScoped};
use crate::protocol::Phase;
use crate::schema::methods;
use crate::schema::*;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Connection held by a client talking to an agent
pub struct ClientSideConnection {
    core: Arc<ConnectionCore>,
}

impl ClientSideConnection {
    /// Start serving `client` over `transport`.
    ///
    /// Spawns the read loop on the current tokio runtime.
    pub fn new<C, T>(client: C, transport: T, options: ConnectionOptions) -> Self
    where
        C: Client + 'static,
        T: Transport + 'static,
    {
        let dispatch = Arc::new(ClientDispatch {
            client: Arc::new(client),
        });
        Self {
            core: ConnectionCore::start(
                Direction::FromClient,
                Arc::new(transport),
                dispatch,
                options,
            ),
        }
    }

    pub async fn initialize(&self, request: InitializeRequest) -> Result<InitializeResponse> {
        match self
            .core
            .request(FromClient::InitializeRequest(request).into())
            .await?
        {
            Message::FromAgent(FromAgent::InitializeResult(response)) => Ok(response),
            other => Err(unexpected_response(methods::INITIALIZE, other)),
        }
    }

    pub async fn authenticate(&self, request: AuthenticateRequest) -> Result<AuthenticateResponse> {
        match self
            .core
            .request(FromClient::AuthenticateRequest(request).into())
            .await?
        {
            Message::FromAgent(FromAgent::AuthenticateResult(response)) => Ok(response),
            other => Err(unexpected_response(methods::AUTHENTICATE, other)),
        }
    }

    pub async fn new_session(&self, request: NewSessionRequest) -> Result<NewSessionResponse> {
        match self
            .core
            .request(FromClient::SessionNewRequest(request).into())
            .await?
        {
            Message::FromAgent(FromAgent::SessionNewResult(response)) => Ok(response),
            other => Err(unexpected_response(methods::SESSION_NEW, other)),
        }
    }

    pub async fn load_session(&self, request: LoadSessionRequest) -> Result<LoadSessionResponse> {
        match self
            .core
            .request(FromClient::SessionLoadRequest(request).into())
            .await?
        {
            Message::FromAgent(FromAgent::SessionLoadResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::SESSION_LOAD, other)),
        }
    }

    /// Run one prompt turn; session updates stream to the [`Client`] handler
    /// while this waits for the stop reason.
    ///
    /// Updates are delivered on a separate ordered task, so this can return
    /// before the handler has seen every update the agent sent ahead of its
    /// response.
    pub async fn prompt(&self, request: PromptRequest) -> Result<PromptResponse> {
        match self
            .core
            .request(FromClient::SessionPromptRequest(request).into())
            .await?
        {
            Message::FromAgent(FromAgent::SessionPromptResult(scoped)) => Ok(scoped.response),
            other => Err(unexpected_response(methods::SESSION_PROMPT, other)),
        }
    }

    pub async fn cancel(&self, notification: CancelNotification) -> Result<()> {
        self.core
            .notify(FromClient::SessionCancel(notification).into())
            .await
    }

    pub async fn set_session_mode(
        &self,
        request: SetSessionModeRequest,
    ) -> Result<SetSessionModeResponse> {
        match self
            .core
            .request(FromClient::SessionSetModeRequest(request).into())
            .await?
        {
            Message::FromAgent(FromAgent::SessionSetModeResult(result)) => Ok(result.response),
            other => Err(unexpected_response(methods::SESSION_SET_MODE, other)),
        }
    }

    pub async fn ext_method(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        let method = method.into();
        match self
            .core
            .request(FromClient::ExtRequest { method, params }.into())
            .await?
        {
            Message::FromAgent(FromAgent::ExtResponse { result, .. }) => Ok(result),
            other => Err(unexpected_response("extension", other)),
        }
    }

    pub async fn ext_notification(&self, method: impl Into<String>, params: Value) -> Result<()> {
        let method = method.into();
        self.core
            .notify(FromClient::ExtNotification { method, params }.into())
            .await
    }

    /// Protocol phase, when the connection enforces the protocol
    pub async fn phase(&self) -> Option<Phase> {
        self.core.phase().await
    }

    /// Number of requests still waiting for the agent
    pub async fn pending_requests(&self) -> usize {
        self.core.pending_count().await
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Close the transport; every waiting call fails with `TransportClosed`
    pub async fn close(&self) {
        self.core.close().await
    }
}

impl Drop for ClientSideConnection {
    fn drop(&mut self) {
        self.core.shut_down_in_background();
    }
}

struct ClientDispatch<C> {
    client: Arc<C>,
}

#[async_trait]
impl<C: Client + 'static> Dispatch for ClientDispatch<C> {
    async fn request(&self, message: Message) -> std::result::Result<Message, JsonRpcError> {
        let Message::FromAgent(request) = message else {
            return Err(JsonRpcError::internal_error("client received its own message"));
        };

        let response = match request {
            FromAgent::ReadTextFileRequest(r) => {
                let session_id = r.session_id.clone();
                let response = self.client.read_text_file(r).await?;
                FromClient::ReadTextFileResult(SessionScoped::new(session_id, response))
            }
            FromAgent::WriteTextFileRequest(r) => {
                let session_id = r.session_id.clone();
                let response = self.client.write_text_file(r).await?;
                FromClient::WriteTextFileResult(SessionScoped::new(session_id, response))
            }
            FromAgent::RequestPermissionRequest(r) => {
                let session_id = r.session_id.clone();
                let response = self.client.request_permission(r).await?;
                FromClient::RequestPermissionResult(SessionScoped::new(session_id, response))
            }
            FromAgent::CreateTerminalRequest(r) => {
                let session_id = r.session_id.clone();
                let response = self.client.create_terminal(r).await?;
                FromClient::CreateTerminalResult(SessionScoped::new(session_id, response))
            }
            FromAgent::TerminalOutputRequest(r) => {
                let (session_id, terminal_id) = (r.session_id.clone(), r.terminal_id.clone());
                let response = self.client.terminal_output(r).await?;
                FromClient::TerminalOutputResult(TerminalScoped::new(
                    session_id,
                    terminal_id,
                    response,
                ))
            }
            FromAgent::WaitForTerminalExitRequest(r) => {
                let (session_id, terminal_id) = (r.session_id.clone(), r.terminal_id.clone());
                let response = self.client.wait_for_terminal_exit(r).await?;
                FromClient::WaitForTerminalExitResult(TerminalScoped::new(
                    session_id,
                    terminal_id,
                    response,
                ))
            }
            FromAgent::KillTerminalRequest(r) => {
                let (session_id, terminal_id) = (r.session_id.clone(), r.terminal_id.clone());
                let response = self.client.kill_terminal(r).await?;
                FromClient::KillTerminalResult(TerminalScoped::new(
                    session_id,
                    terminal_id,
                    response,
                ))
            }
            FromAgent::ReleaseTerminalRequest(r) => {
                let (session_id, terminal_id) = (r.session_id.clone(), r.terminal_id.clone());
                let response = self.client.release_terminal(r).await?;
                FromClient::ReleaseTerminalResult(TerminalScoped::new(
                    session_id,
                    terminal_id,
                    response,
                ))
            }
            FromAgent::ExtRequest { method, params } => {
                let result = self.client.ext_method(method.clone(), params).await?;
                FromClient::ExtResponse { method, result }
            }
            other => return Err(JsonRpcError::method_not_found(other.method())),
        };
        Ok(response.into())
    }

    async fn notification(&self, message: Message) {
        match message {
            Message::FromAgent(FromAgent::SessionUpdate(notification)) => {
                self.client.session_notification(notification).await
            }
            Message::FromAgent(FromAgent::ExtNotification { method, params }) => {
                self.client.ext_notification(method, params).await
            }
            other => tracing::warn!("[connection] client ignored {}", other),
        }
    }
}
