//! Request/response machinery shared by both connection sides
//!
//! One read loop per connection pulls frames off the transport in arrival
//! order and decodes them under the state lock. Responses resolve the caller
//! waiting on their id, requests are answered from spawned handler tasks, and
//! notifications are queued to a single task that delivers them in order.

use super::ConnectionOptions;
use crate::codec::{self, peek_id, peek_kind, peek_method, CodecState};
use crate::error::{
    ConnectionError, DecodeError, JsonRpcError, Result, ToJsonRpcError, TransportError,
};
use crate::message::{Direction, FromAgent, FromClient, Message, MessageKind};
use crate::protocol::{self, Phase};
use crate::schema::RequestId;
use crate::transport::Transport;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type Waiter = oneshot::Sender<Result<Message>>;

/// Routes inbound traffic to the local handler
#[async_trait]
pub(crate) trait Dispatch: Send + Sync {
    /// Answer one inbound request with the typed response message
    async fn request(&self, message: Message) -> std::result::Result<Message, JsonRpcError>;

    async fn notification(&self, message: Message);
}

struct CoreState {
    codec: CodecState,
    /// Present only when protocol enforcement is on
    phase: Option<Phase>,
    waiters: HashMap<RequestId, Waiter>,
    closed: bool,
}

pub(crate) struct ConnectionCore {
    local: Direction,
    transport: Arc<dyn Transport>,
    state: Mutex<CoreState>,
    next_id: AtomicI64,
    options: ConnectionOptions,
    shutdown: CancellationToken,
}

impl ConnectionCore {
    /// Build the core and spawn its read loop and notification task.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn start(
        local: Direction,
        transport: Arc<dyn Transport>,
        dispatch: Arc<dyn Dispatch>,
        options: ConnectionOptions,
    ) -> Arc<Self> {
        let core = Arc::new(Self {
            local,
            transport,
            state: Mutex::new(CoreState {
                codec: CodecState::new(),
                phase: options.enforce_protocol.then(Phase::initial),
                waiters: HashMap::new(),
                closed: false,
            }),
            next_id: AtomicI64::new(0),
            options,
            shutdown: CancellationToken::new(),
        });

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        tokio::spawn(deliver_notifications(Arc::clone(&dispatch), notify_rx));
        tokio::spawn(Arc::clone(&core).read_loop(dispatch, notify_tx));

        info!(
            "[connection] {} side started (timeout: {:?}, enforce protocol: {})",
            side_name(local),
            core.options.request_timeout,
            core.options.enforce_protocol
        );
        core
    }

    /// Send a request and wait for the peer's response to it.
    ///
    /// Error responses come back as `Ok` with the side's request-error
    /// message; the typed wrappers turn those into [`ConnectionError::Rpc`].
    pub(crate) async fn request(&self, message: Message) -> Result<Message> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let method = message.method().to_string();
        let (tx, rx) = oneshot::channel();

        let frame = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ConnectionError::TransportClosed);
            }
            let frame = self.commit_outbound(&mut state, Some(&id), &message, true)?;
            state.waiters.insert(id.clone(), tx);
            frame
        };

        debug!("[connection] -> {} (id {})", message, id);
        if let Err(err) = self.transport.send(frame).await {
            self.abandon(&id).await;
            return Err(err.into());
        }

        let reply = match self.options.request_timeout {
            Some(after) => match tokio::time::timeout(after, rx).await {
                Ok(reply) => reply,
                Err(_) => {
                    warn!("[connection] {} (id {}) timed out after {:?}", method, id, after);
                    self.abandon(&id).await;
                    return Err(ConnectionError::Timeout { method, after });
                }
            },
            None => rx.await,
        };
        reply.unwrap_or(Err(ConnectionError::TransportClosed))
    }

    pub(crate) async fn notify(&self, message: Message) -> Result<()> {
        let frame = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ConnectionError::TransportClosed);
            }
            self.commit_outbound(&mut state, None, &message, true)?
        };
        debug!("[connection] -> {}", message);
        self.transport.send(frame).await?;
        Ok(())
    }

    pub(crate) async fn phase(&self) -> Option<Phase> {
        self.state.lock().await.phase.clone()
    }

    pub(crate) async fn pending_count(&self) -> usize {
        self.state.lock().await.waiters.len()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Close the transport and release every waiting caller
    pub(crate) async fn close(&self) {
        let waiters: Vec<Waiter> = {
            let mut state = self.state.lock().await;
            if state.closed {
                return;
            }
            state.closed = true;
            state.waiters.drain().map(|(_, waiter)| waiter).collect()
        };

        info!(
            "[connection] {} side closing, releasing {} waiting caller(s)",
            side_name(self.local),
            waiters.len()
        );
        for waiter in waiters {
            let _ = waiter.send(Err(ConnectionError::TransportClosed));
        }
        self.shutdown.cancel();
        if let Err(err) = self.transport.close().await {
            debug!("[connection] transport close failed: {}", err);
        }
    }

    /// Stop the read loop without awaiting; it closes the transport on exit
    pub(crate) fn shut_down_in_background(&self) {
        self.shutdown.cancel();
    }

    /// Encode `message`, thread it through the local codec and, when
    /// enforcing, the protocol state machine. Commits only on success.
    ///
    /// With `strict` unset a protocol violation is logged and the message is
    /// still committed; responses must always reach the peer.
    fn commit_outbound(
        &self,
        state: &mut CoreState,
        id: Option<&RequestId>,
        message: &Message,
        strict: bool,
    ) -> Result<String> {
        let frame = codec::encode(id, message)?;
        let (next_codec, decoded) = codec::decode(self.local, &state.codec, &frame)?;

        let phase = match &state.phase {
            Some(phase) => match protocol::step(phase, &decoded) {
                Ok(next) => Some(next),
                Err(err) if strict => return Err(err.into()),
                Err(err) => {
                    warn!("[connection] sending {} despite: {}", decoded, err);
                    None
                }
            },
            None => None,
        };

        state.codec = next_codec;
        if phase.is_some() {
            state.phase = phase;
        }
        Ok(frame)
    }

    /// Forget a request whose caller stopped waiting
    async fn abandon(&self, id: &RequestId) {
        let mut state = self.state.lock().await;
        state.waiters.remove(id);
        state.codec.forget_response(self.local.opposite(), id);
    }

    async fn read_loop(
        self: Arc<Self>,
        dispatch: Arc<dyn Dispatch>,
        notifications: mpsc::UnboundedSender<Message>,
    ) {
        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                received = self.transport.receive() => received,
            };

            match received {
                Ok(Some(frame)) => self.handle_frame(frame, &dispatch, &notifications).await,
                Ok(None) => {
                    info!("[connection] transport closed by peer");
                    break;
                }
                Err(TransportError::FrameTooLarge { limit }) => {
                    warn!("[connection] skipped a frame over the {} byte limit", limit);
                }
                Err(err) => {
                    warn!("[connection] transport failed: {}", err);
                    break;
                }
            }
        }
        self.close().await;
    }

    async fn handle_frame(
        self: &Arc<Self>,
        frame: String,
        dispatch: &Arc<dyn Dispatch>,
        notifications: &mpsc::UnboundedSender<Message>,
    ) {
        let peer = self.local.opposite();
        let value: Value = match serde_json::from_str(&frame) {
            Ok(value) => value,
            Err(err) => {
                warn!("[connection] unparseable frame: {}", err);
                let error = DecodeError::InvalidJson(err.to_string()).to_json_rpc_error();
                self.send_error_frame(None, error).await;
                return;
            }
        };
        let id = peek_id(&value);
        let kind = peek_kind(&value);
        let method = peek_method(&value).map(str::to_string);

        let mut state = self.state.lock().await;
        let decoded = codec::decode_value(peer, &state.codec, value);
        let (next_codec, message) = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!(
                    "[connection] undecodable frame (method {}): {}",
                    method.as_deref().unwrap_or("-"),
                    err
                );
                match (kind, id) {
                    (Some(MessageKind::Response), Some(id)) => {
                        state.codec.forget_response(peer, &id);
                        if let Some(waiter) = state.waiters.remove(&id) {
                            let _ = waiter.send(Err(err.into()));
                        }
                    }
                    (Some(MessageKind::Request), Some(id)) => {
                        drop(state);
                        self.send_error_frame(Some(&id), err.to_json_rpc_error())
                            .await;
                    }
                    _ => {}
                }
                return;
            }
        };

        let stepped = state
            .phase
            .as_ref()
            .map(|phase| protocol::step(phase, &message));
        let next_phase = match stepped {
            Some(Ok(next)) => Some(next),
            Some(Err(err)) => {
                warn!("[connection] peer sent {} out of turn: {}", message, err);
                match (message.kind(), id) {
                    (MessageKind::Request, Some(id)) => {
                        drop(state);
                        self.send_error_frame(Some(&id), err.to_json_rpc_error())
                            .await;
                    }
                    (MessageKind::Response, Some(id)) => {
                        state.codec = next_codec;
                        if let Some(waiter) = state.waiters.remove(&id) {
                            let _ = waiter.send(Err(err.into()));
                        }
                    }
                    _ => {}
                }
                return;
            }
            None => None,
        };

        state.codec = next_codec;
        if next_phase.is_some() {
            state.phase = next_phase;
        }
        debug!("[connection] <- {}", message);

        match message.kind() {
            MessageKind::Response => {
                let waiter = id.and_then(|id| state.waiters.remove(&id));
                drop(state);
                match waiter {
                    Some(waiter) => {
                        if waiter.send(Ok(message)).is_err() {
                            debug!("[connection] caller went away before its response");
                        }
                    }
                    None => warn!("[connection] nobody is waiting for {}", message),
                }
            }
            MessageKind::Request => {
                drop(state);
                let Some(id) = id else {
                    return;
                };
                let core = Arc::clone(self);
                let dispatch = Arc::clone(dispatch);
                tokio::spawn(async move {
                    let outcome = dispatch.request(message).await;
                    core.respond(id, outcome).await;
                });
            }
            MessageKind::Notification => {
                drop(state);
                if notifications.send(message).is_err() {
                    warn!("[connection] notification task is gone");
                }
            }
        }
    }

    /// Answer the inbound request `id` with a handler outcome
    async fn respond(&self, id: RequestId, outcome: std::result::Result<Message, JsonRpcError>) {
        let frame = {
            let mut state = self.state.lock().await;
            if state.closed {
                debug!("[connection] dropping response {} on a closed connection", id);
                return;
            }

            let committed = match outcome {
                Ok(message) => self.commit_outbound(&mut state, Some(&id), &message, false),
                Err(error) => Err(ConnectionError::Rpc(error)),
            };
            match committed {
                Ok(frame) => frame,
                Err(err) => {
                    let error = match err {
                        ConnectionError::Rpc(error) => error,
                        other => {
                            warn!("[connection] handler response to {} rejected: {}", id, other);
                            JsonRpcError::internal_error(other.to_string())
                        }
                    };
                    match self.error_message(&state.codec, &id, error.clone()) {
                        Some(message) => self
                            .commit_outbound(&mut state, Some(&id), &message, false)
                            .unwrap_or_else(|_| raw_error_frame(Some(&id), &error)),
                        None => raw_error_frame(Some(&id), &error),
                    }
                }
            }
        };

        debug!("[connection] -> response {}", id);
        if let Err(err) = self.transport.send(frame).await {
            warn!("[connection] failed to send response {}: {}", id, err);
        }
    }

    /// Error response to the pending inbound request `id`
    fn error_message(
        &self,
        codec: &CodecState,
        id: &RequestId,
        error: JsonRpcError,
    ) -> Option<Message> {
        match self.local {
            Direction::FromClient => codec
                .pending_agent_requests
                .get(id)
                .cloned()
                .map(|request| FromClient::AgentRequestError { request, error }.into()),
            Direction::FromAgent => codec
                .pending_client_requests
                .get(id)
                .cloned()
                .map(|request| FromAgent::ClientRequestError { request, error }.into()),
        }
    }

    async fn send_error_frame(&self, id: Option<&RequestId>, error: JsonRpcError) {
        if let Err(err) = self.transport.send(raw_error_frame(id, &error)).await {
            warn!("[connection] failed to send error response: {}", err);
        }
    }
}

/// Error response built straight from the envelope, for requests the codec
/// never accepted
fn raw_error_frame(id: Option<&RequestId>, error: &JsonRpcError) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id.map(RequestId::to_value).unwrap_or(Value::Null),
        "error": error,
    })
    .to_string()
}

async fn deliver_notifications(
    dispatch: Arc<dyn Dispatch>,
    mut notifications: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = notifications.recv().await {
        dispatch.notification(message).await;
    }
    debug!("[connection] notification task stopped");
}

fn side_name(direction: Direction) -> &'static str {
    match direction {
        Direction::FromClient => "client",
        Direction::FromAgent => "agent",
    }
}
