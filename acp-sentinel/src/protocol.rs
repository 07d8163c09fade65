//! ACP protocol state machine
//!
//! A pure fold: [`step`] takes the current [`Phase`] and the next observed
//! [`Message`] and returns the successor phase or the [`ProtocolError`] that
//! makes the message illegal. It never mutates its input, so replay and live
//! enforcement share one implementation and any phase can be resumed from.

use crate::codec::PendingClientRequest;
use crate::error::ProtocolError;
use crate::message::{FromAgent, FromClient, Message, MessageKind};
use crate::schema::{
    InitializeRequest, InitializeResponse, SessionId, SessionModeId, SessionModeState,
    SessionUpdate, StopReason,
};
use std::collections::HashMap;

/// Prompt turn state of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnState {
    /// No prompt outstanding; carries the stop reason of the last turn
    Idle(Option<StopReason>),
    /// A prompt awaits its result; the cancel flag only ever goes false to true
    PromptInFlight { cancel_requested: bool },
}

impl TurnState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TurnState::PromptInFlight { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub session_id: SessionId,
    pub modes: Option<SessionModeState>,
    pub turn: TurnState,
}

impl SessionState {
    pub fn new(session_id: SessionId, modes: Option<SessionModeState>) -> Self {
        Self {
            session_id,
            modes,
            turn: TurnState::Idle(None),
        }
    }

    fn set_current_mode(&mut self, mode_id: &SessionModeId) {
        if let Some(modes) = self.modes.as_mut() {
            modes.current_mode_id = mode_id.clone();
        }
    }
}

/// Values negotiated by the handshake plus every live session
#[derive(Debug, Clone, PartialEq)]
pub struct InitializedContext {
    pub client: InitializeRequest,
    pub agent: InitializeResponse,
    pub sessions: HashMap<SessionId, SessionState>,
}

impl InitializedContext {
    pub fn session(&self, session_id: &SessionId) -> Option<&SessionState> {
        self.sessions.get(session_id)
    }

    fn session_mut(&mut self, session_id: &SessionId) -> Result<&mut SessionState, ProtocolError> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| ProtocolError::UnknownSession(session_id.clone()))
    }

    fn require_session(&self, session_id: &SessionId) -> Result<&SessionState, ProtocolError> {
        self.sessions
            .get(session_id)
            .ok_or_else(|| ProtocolError::UnknownSession(session_id.clone()))
    }
}

/// Connection lifecycle phase
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    AwaitingInitialize,
    WaitingForInitializeResult(InitializeRequest),
    Ready(InitializedContext),
}

impl Phase {
    pub fn initial() -> Self {
        Phase::AwaitingInitialize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Phase::AwaitingInitialize => "awaiting initialize",
            Phase::WaitingForInitializeResult(_) => "waiting for initialize result",
            Phase::Ready(_) => "ready",
        }
    }

    pub fn context(&self) -> Option<&InitializedContext> {
        match self {
            Phase::Ready(context) => Some(context),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Phase::Ready(_))
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::initial()
    }
}

pub type StepFn = fn(&Phase, &Message) -> Result<Phase, ProtocolError>;

/// A protocol as the validator consumes it: a start phase and a transition
#[derive(Debug, Clone)]
pub struct ProtocolSpec {
    pub initial: Phase,
    pub step: StepFn,
}

impl ProtocolSpec {
    pub fn acp() -> Self {
        Self {
            initial: Phase::initial(),
            step,
        }
    }
}

impl Default for ProtocolSpec {
    fn default() -> Self {
        Self::acp()
    }
}

/// Advance `phase` by one observed message
pub fn step(phase: &Phase, message: &Message) -> Result<Phase, ProtocolError> {
    match phase {
        Phase::AwaitingInitialize => match message {
            Message::FromClient(FromClient::InitializeRequest(request)) => {
                Ok(Phase::WaitingForInitializeResult(request.clone()))
            }
            other => Err(unexpected(phase, other)),
        },
        Phase::WaitingForInitializeResult(request) => match message {
            Message::FromClient(FromClient::InitializeRequest(_)) => {
                Err(ProtocolError::DuplicateInitialize)
            }
            Message::FromAgent(FromAgent::InitializeResult(response)) => {
                Ok(Phase::Ready(InitializedContext {
                    client: request.clone(),
                    agent: response.clone(),
                    sessions: HashMap::new(),
                }))
            }
            // a rejected initialize lets the client try again
            Message::FromAgent(FromAgent::ClientRequestError {
                request: PendingClientRequest::Initialize,
                ..
            }) => Ok(Phase::AwaitingInitialize),
            Message::FromAgent(other) if other.kind() == MessageKind::Response => {
                Err(ProtocolError::InitializeResultWithoutRequest {
                    method: other.method().to_string(),
                })
            }
            other => Err(unexpected(phase, other)),
        },
        Phase::Ready(context) => {
            let mut next = context.clone();
            match message {
                Message::FromClient(message) => client_step(&mut next, message)?,
                Message::FromAgent(message) => agent_step(&mut next, message)?,
            }
            Ok(Phase::Ready(next))
        }
    }
}

/// Fold a whole message sequence, stopping at the first error
pub fn fold<'a>(
    spec: &ProtocolSpec,
    messages: impl IntoIterator<Item = &'a Message>,
) -> Result<Phase, ProtocolError> {
    messages
        .into_iter()
        .try_fold(spec.initial.clone(), |phase, message| (spec.step)(&phase, message))
}

fn unexpected(phase: &Phase, message: &Message) -> ProtocolError {
    ProtocolError::UnexpectedMessage {
        phase: phase.name(),
        method: message.method().to_string(),
    }
}

fn client_step(context: &mut InitializedContext, message: &FromClient) -> Result<(), ProtocolError> {
    match message {
        FromClient::InitializeRequest(_) => Err(ProtocolError::DuplicateInitialize),
        FromClient::SessionPromptRequest(request) => {
            let session = context.session_mut(&request.session_id)?;
            match session.turn {
                TurnState::Idle(_) => {
                    session.turn = TurnState::PromptInFlight {
                        cancel_requested: false,
                    };
                    Ok(())
                }
                TurnState::PromptInFlight { .. } => Err(ProtocolError::PromptAlreadyInFlight(
                    request.session_id.clone(),
                )),
            }
        }
        FromClient::SessionSetModeRequest(request) => {
            context.require_session(&request.session_id)?;
            Ok(())
        }
        FromClient::SessionCancel(notification) => {
            let session = context.session_mut(&notification.session_id)?;
            match session.turn {
                TurnState::PromptInFlight { .. } => {
                    session.turn = TurnState::PromptInFlight {
                        cancel_requested: true,
                    };
                    Ok(())
                }
                TurnState::Idle(_) => Err(ProtocolError::NoPromptInFlight(
                    notification.session_id.clone(),
                )),
            }
        }
        FromClient::AuthenticateRequest(_)
        | FromClient::SessionNewRequest(_)
        | FromClient::SessionLoadRequest(_)
        | FromClient::ReadTextFileResult(_)
        | FromClient::WriteTextFileResult(_)
        | FromClient::RequestPermissionResult(_)
        | FromClient::CreateTerminalResult(_)
        | FromClient::TerminalOutputResult(_)
        | FromClient::WaitForTerminalExitResult(_)
        | FromClient::KillTerminalResult(_)
        | FromClient::ReleaseTerminalResult(_)
        | FromClient::AgentRequestError { .. }
        | FromClient::ExtRequest { .. }
        | FromClient::ExtNotification { .. }
        | FromClient::ExtResponse { .. } => Ok(()),
    }
}

fn agent_step(context: &mut InitializedContext, message: &FromAgent) -> Result<(), ProtocolError> {
    match message {
        FromAgent::InitializeResult(_) => Err(ProtocolError::DuplicateInitialize),
        FromAgent::SessionNewResult(response) => {
            if context.sessions.contains_key(&response.session_id) {
                return Err(ProtocolError::SessionAlreadyExists(
                    response.session_id.clone(),
                ));
            }
            context.sessions.insert(
                response.session_id.clone(),
                SessionState::new(response.session_id.clone(), response.modes.clone()),
            );
            Ok(())
        }
        FromAgent::SessionLoadResult(scoped) => {
            let modes = scoped.response.modes.clone();
            match context.sessions.get_mut(&scoped.session_id) {
                Some(session) => {
                    if modes.is_some() {
                        session.modes = modes;
                    }
                }
                None => {
                    context.sessions.insert(
                        scoped.session_id.clone(),
                        SessionState::new(scoped.session_id.clone(), modes),
                    );
                }
            }
            Ok(())
        }
        FromAgent::SessionPromptResult(scoped) => {
            let session = context.session_mut(&scoped.session_id)?;
            if !session.turn.is_in_flight() {
                return Err(ProtocolError::NoPromptInFlight(scoped.session_id.clone()));
            }
            session.turn = TurnState::Idle(Some(scoped.response.stop_reason));
            Ok(())
        }
        FromAgent::SessionSetModeResult(result) => {
            context
                .session_mut(&result.session_id)?
                .set_current_mode(&result.mode_id);
            Ok(())
        }
        FromAgent::SessionUpdate(notification) => {
            let session = context.session_mut(&notification.session_id)?;
            if let SessionUpdate::CurrentModeUpdate(update) = &notification.update {
                session.set_current_mode(&update.current_mode_id);
            }
            Ok(())
        }
        FromAgent::RequestPermissionRequest(request) => {
            let session = context.require_session(&request.session_id)?;
            if !session.turn.is_in_flight() {
                return Err(ProtocolError::NoPromptInFlight(request.session_id.clone()));
            }
            Ok(())
        }
        FromAgent::ClientRequestError {
            request: PendingClientRequest::SessionPrompt(session_id),
            ..
        } => {
            if let Some(session) = context.sessions.get_mut(session_id) {
                if session.turn.is_in_flight() {
                    session.turn = TurnState::Idle(None);
                }
            }
            Ok(())
        }
        FromAgent::AuthenticateResult(_)
        | FromAgent::ReadTextFileRequest(_)
        | FromAgent::WriteTextFileRequest(_)
        | FromAgent::CreateTerminalRequest(_)
        | FromAgent::TerminalOutputRequest(_)
        | FromAgent::WaitForTerminalExitRequest(_)
        | FromAgent::KillTerminalRequest(_)
        | FromAgent::ReleaseTerminalRequest(_)
        | FromAgent::ClientRequestError { .. }
        | FromAgent::ExtRequest { .. }
        | FromAgent::ExtNotification { .. }
        | FromAgent::ExtResponse { .. } => Ok(()),
    }
}
