//! Shared fixtures for the integration tests
//!
//! `TestAgent` and `RecordingClient` are small scripted peers; `connect`
//! wires them together over a duplex transport pair.

#![allow(dead_code)]

use acp_sentinel::connection::{Agent, Client, ConnectionOptions, HandlerResult};
use acp_sentinel::message::{FromAgent, FromClient, Message, ModeSetResult, SessionScoped};
use acp_sentinel::schema::*;
use acp_sentinel::transport::{DuplexTransport, Recording, RecordingTransport};
use acp_sentinel::{AgentSideConnection, ClientSideConnection, JsonRpcError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;

pub const PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion(1);

// ---- message builders ----

pub fn initialize() -> Message {
    FromClient::InitializeRequest(InitializeRequest {
        protocol_version: PROTOCOL_VERSION,
        ..Default::default()
    })
    .into()
}

pub fn initialized() -> Message {
    FromAgent::InitializeResult(InitializeResponse {
        protocol_version: PROTOCOL_VERSION,
        ..Default::default()
    })
    .into()
}

pub fn handshake() -> Vec<Message> {
    vec![initialize(), initialized()]
}

pub fn modes(current: &str, available: &[&str]) -> SessionModeState {
    SessionModeState {
        current_mode_id: SessionModeId::new(current),
        available_modes: available
            .iter()
            .map(|id| SessionMode::new(*id, id.to_uppercase()))
            .collect(),
    }
}

pub fn new_session_request() -> Message {
    FromClient::SessionNewRequest(NewSessionRequest::new("/workspace")).into()
}

pub fn new_session_result(session_id: &str, modes: Option<SessionModeState>) -> Message {
    FromAgent::SessionNewResult(NewSessionResponse {
        session_id: SessionId::new(session_id),
        modes,
    })
    .into()
}

pub fn prompt(session_id: &str, text: &str) -> Message {
    FromClient::SessionPromptRequest(PromptRequest::new(
        session_id,
        vec![ContentBlock::text(text)],
    ))
    .into()
}

pub fn prompt_result(session_id: &str, stop_reason: StopReason) -> Message {
    FromAgent::SessionPromptResult(SessionScoped::new(
        session_id,
        PromptResponse { stop_reason },
    ))
    .into()
}

pub fn cancel(session_id: &str) -> Message {
    FromClient::SessionCancel(CancelNotification {
        session_id: SessionId::new(session_id),
    })
    .into()
}

pub fn set_mode(session_id: &str, mode_id: &str) -> Message {
    FromClient::SessionSetModeRequest(SetSessionModeRequest {
        session_id: SessionId::new(session_id),
        mode_id: SessionModeId::new(mode_id),
    })
    .into()
}

pub fn mode_set(session_id: &str, mode_id: &str) -> Message {
    FromAgent::SessionSetModeResult(ModeSetResult {
        session_id: SessionId::new(session_id),
        mode_id: SessionModeId::new(mode_id),
        response: SetSessionModeResponse {},
    })
    .into()
}

pub fn agent_says(session_id: &str, text: &str) -> Message {
    FromAgent::SessionUpdate(SessionNotification::new(
        session_id,
        SessionUpdate::AgentMessageChunk(ContentChunk {
            content: ContentBlock::text(text),
        }),
    ))
    .into()
}

pub fn mode_update(session_id: &str, mode_id: &str) -> Message {
    FromAgent::SessionUpdate(SessionNotification::new(
        session_id,
        SessionUpdate::CurrentModeUpdate(CurrentModeUpdate {
            current_mode_id: SessionModeId::new(mode_id),
        }),
    ))
    .into()
}

pub fn permission_request(session_id: &str, tool_call_id: &str) -> RequestPermissionRequest {
    RequestPermissionRequest {
        session_id: SessionId::new(session_id),
        tool_call: ToolCallUpdate::new(tool_call_id),
        options: vec![
            PermissionOption {
                option_id: PermissionOptionId::new("allow"),
                name: "Allow".to_string(),
                kind: PermissionOptionKind::AllowOnce,
            },
            PermissionOption {
                option_id: PermissionOptionId::new("reject"),
                name: "Reject".to_string(),
                kind: PermissionOptionKind::RejectOnce,
            },
        ],
    }
}

/// Handshake, one session and a prompt ready to be answered
pub fn session_preamble(session_id: &str) -> Vec<Message> {
    let mut messages = handshake();
    messages.push(new_session_request());
    messages.push(new_session_result(session_id, None));
    messages
}

// ---- scripted peers ----

/// Agent whose prompt behaviour is picked by the prompt text:
/// `permission` asks the client before finishing, `wait` blocks until
/// cancelled, `slow:<ms>` sleeps first, anything else echoes.
#[derive(Clone, Default)]
pub struct TestAgent {
    pub connection: Arc<OnceLock<Arc<AgentSideConnection>>>,
    pub cancelled: Arc<Notify>,
    pub sessions: Arc<AtomicUsize>,
    pub permission_outcomes: Arc<Mutex<Vec<RequestPermissionOutcome>>>,
    pub session_modes: Option<SessionModeState>,
}

impl TestAgent {
    fn connection(&self) -> HandlerResult<Arc<AgentSideConnection>> {
        self.connection
            .get()
            .cloned()
            .ok_or_else(|| JsonRpcError::internal_error("agent connection not wired"))
    }

    async fn say(&self, session_id: &SessionId, text: &str) -> HandlerResult<()> {
        self.connection()?
            .session_notification(SessionNotification::new(
                session_id.clone(),
                SessionUpdate::AgentMessageChunk(ContentChunk {
                    content: ContentBlock::text(text),
                }),
            ))
            .await
            .map_err(|e| JsonRpcError::internal_error(e.to_string()))
    }
}

#[async_trait]
impl Agent for TestAgent {
    async fn initialize(&self, request: InitializeRequest) -> HandlerResult<InitializeResponse> {
        Ok(InitializeResponse {
            protocol_version: request.protocol_version,
            ..Default::default()
        })
    }

    async fn new_session(&self, _request: NewSessionRequest) -> HandlerResult<NewSessionResponse> {
        let n = self.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(NewSessionResponse {
            session_id: SessionId::new(format!("sess-{}", n)),
            modes: self.session_modes.clone(),
        })
    }

    async fn prompt(&self, request: PromptRequest) -> HandlerResult<PromptResponse> {
        let text = request
            .prompt
            .first()
            .and_then(ContentBlock::as_text)
            .unwrap_or_default()
            .to_string();
        let session_id = request.session_id;

        let stop_reason = if text == "permission" {
            let connection = self.connection()?;
            connection
                .session_notification(SessionNotification::new(
                    session_id.clone(),
                    SessionUpdate::ToolCall(ToolCall {
                        tool_call_id: ToolCallId::new("call-1"),
                        title: "Edit main.rs".to_string(),
                        kind: ToolKind::Edit,
                        status: ToolCallStatus::Pending,
                        content: Vec::new(),
                        locations: Vec::new(),
                        raw_input: None,
                        raw_output: None,
                    }),
                ))
                .await
                .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
            let response = connection
                .request_permission(permission_request(session_id.as_str(), "call-1"))
                .await
                .map_err(|e| JsonRpcError::internal_error(e.to_string()))?;
            self.permission_outcomes
                .lock()
                .unwrap()
                .push(response.outcome);
            StopReason::EndTurn
        } else if text == "wait" {
            self.cancelled.notified().await;
            StopReason::Cancelled
        } else if let Some(ms) = text.strip_prefix("slow:") {
            let ms = ms.parse().unwrap_or(50);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            StopReason::EndTurn
        } else {
            self.say(&session_id, &format!("echo: {}", text)).await?;
            StopReason::EndTurn
        };
        Ok(PromptResponse { stop_reason })
    }

    async fn cancel(&self, _notification: CancelNotification) {
        self.cancelled.notify_one();
    }

    async fn set_session_mode(
        &self,
        _request: SetSessionModeRequest,
    ) -> HandlerResult<SetSessionModeResponse> {
        Ok(SetSessionModeResponse {})
    }

    async fn ext_method(&self, method: String, params: Value) -> HandlerResult<Value> {
        match method.as_str() {
            "_test/echo" => {
                let delay = params.get("delayMs").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(params)
            }
            "_test/fail" => Err(JsonRpcError::new(-32050, "scripted failure")
                .with_data(json!({"retry": false}))),
            _ => Err(JsonRpcError::method_not_found(&method)),
        }
    }
}

/// Client that records every session update and allows every permission
#[derive(Clone, Default)]
pub struct RecordingClient {
    pub updates: Arc<Mutex<Vec<SessionNotification>>>,
    pub permission_requests: Arc<Mutex<Vec<RequestPermissionRequest>>>,
}

impl RecordingClient {
    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

#[async_trait]
impl Client for RecordingClient {
    async fn request_permission(
        &self,
        request: RequestPermissionRequest,
    ) -> HandlerResult<RequestPermissionResponse> {
        let option_id = request
            .options
            .first()
            .map(|option| option.option_id.clone())
            .ok_or_else(|| JsonRpcError::invalid_params("no permission options"))?;
        self.permission_requests.lock().unwrap().push(request);
        Ok(RequestPermissionResponse {
            outcome: RequestPermissionOutcome::Selected(SelectedPermissionOutcome { option_id }),
        })
    }

    async fn session_notification(&self, notification: SessionNotification) {
        self.updates.lock().unwrap().push(notification);
    }

    async fn read_text_file(
        &self,
        request: ReadTextFileRequest,
    ) -> HandlerResult<ReadTextFileResponse> {
        Ok(ReadTextFileResponse {
            content: format!("contents of {}", request.path.display()),
        })
    }
}

// ---- harness ----

pub struct Harness {
    pub client: Arc<ClientSideConnection>,
    pub agent: Arc<AgentSideConnection>,
    pub test_agent: TestAgent,
    pub test_client: RecordingClient,
    /// Every frame the client side sent or received
    pub recording: Recording,
}

pub fn connect(options: ConnectionOptions) -> Harness {
    connect_with(TestAgent::default(), options)
}

pub fn connect_with(test_agent: TestAgent, options: ConnectionOptions) -> Harness {
    let (client_io, agent_io) = DuplexTransport::pair();
    let client_io = RecordingTransport::new(client_io);
    let recording = client_io.recording();

    let agent = Arc::new(AgentSideConnection::new(
        test_agent.clone(),
        agent_io,
        options.clone(),
    ));
    let _ = test_agent.connection.set(Arc::clone(&agent));

    let test_client = RecordingClient::default();
    let client = Arc::new(ClientSideConnection::new(
        test_client.clone(),
        client_io,
        options,
    ));

    Harness {
        client,
        agent,
        test_agent,
        test_client,
        recording,
    }
}

impl Harness {
    pub async fn open_session(&self) -> SessionId {
        self.client
            .initialize(InitializeRequest {
                protocol_version: PROTOCOL_VERSION,
                ..Default::default()
            })
            .await
            .unwrap();
        self.client
            .new_session(NewSessionRequest::new("/workspace"))
            .await
            .unwrap()
            .session_id
    }
}

/// Poll `check` until it holds, failing the test after five seconds
pub async fn wait_until(check: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
