//! Error taxonomies of the sentinel engine
//!
//! Decoding, encoding, the protocol fold and the transports each own a closed
//! enum. [`ConnectionError`] wraps them for live-traffic callers.

use crate::json_rpc_codes;
use crate::message::Direction;
use crate::schema::{RequestId, SessionId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// JSON-RPC 2.0 error object as carried in a response frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            json_rpc_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::new(json_rpc_codes::INVALID_PARAMS, reason)
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::new(json_rpc_codes::INTERNAL_ERROR, reason)
    }

    pub fn auth_required() -> Self {
        Self::new(json_rpc_codes::AUTH_REQUIRED, "Authentication required")
    }

    pub fn resource_not_found(what: impl fmt::Display) -> Self {
        Self::new(
            json_rpc_codes::RESOURCE_NOT_FOUND,
            format!("Resource not found: {}", what),
        )
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for JsonRpcError {}

/// Trait for converting errors to JSON-RPC format
///
/// Errors that can cross the wire implement this so a dispatch loop can answer
/// a failed inbound request with a proper `error` object.
pub trait ToJsonRpcError: fmt::Display {
    fn to_json_rpc_code(&self) -> i32;

    fn to_error_data(&self) -> Option<Value> {
        None
    }

    fn to_json_rpc_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: self.to_json_rpc_code(),
            message: self.to_string(),
            data: self.to_error_data(),
        }
    }
}

/// Failure to turn a raw frame into a [`crate::message::Message`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid JSON-RPC envelope: {0}")]
    InvalidJsonRpc(String),

    #[error("request id {id} is already pending {direction}")]
    DuplicateRequestId { direction: Direction, id: RequestId },

    #[error("response id {id} does not match any pending request")]
    UnknownRequestId { id: RequestId },

    #[error("invalid params for {method}: {reason}")]
    InvalidParams { method: String, reason: String },

    #[error("invalid result for {method}: {reason}")]
    InvalidResult { method: String, reason: String },

    #[error("invalid error object: {0}")]
    InvalidErrorObject(String),

    #[error("method {method} cannot be sent {direction}")]
    WrongDirection { direction: Direction, method: String },
}

impl ToJsonRpcError for DecodeError {
    fn to_json_rpc_code(&self) -> i32 {
        match self {
            DecodeError::InvalidJson(_) => json_rpc_codes::PARSE_ERROR,
            DecodeError::InvalidJsonRpc(_)
            | DecodeError::DuplicateRequestId { .. }
            | DecodeError::UnknownRequestId { .. } => json_rpc_codes::INVALID_REQUEST,
            DecodeError::WrongDirection { .. } => json_rpc_codes::METHOD_NOT_FOUND,
            DecodeError::InvalidParams { .. } => json_rpc_codes::INVALID_PARAMS,
            DecodeError::InvalidResult { .. } | DecodeError::InvalidErrorObject(_) => {
                json_rpc_codes::INTERNAL_ERROR
            }
        }
    }
}

/// Failure to turn a [`crate::message::Message`] into a raw frame
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{method} requires a request id")]
    MissingRequestId { method: String },

    #[error("{method} is a notification and cannot carry a request id")]
    UnexpectedRequestId { method: String },

    #[error("unsupported message shape: {0}")]
    UnsupportedShape(String),
}

/// Illegal transition of the protocol state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("unexpected {method} while {phase}")]
    UnexpectedMessage { phase: &'static str, method: String },

    #[error("initialize was already sent")]
    DuplicateInitialize,

    #[error("{method} arrived before the initialize result")]
    InitializeResultWithoutRequest { method: String },

    #[error("session {0} already exists")]
    SessionAlreadyExists(SessionId),

    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("session {0} already has a prompt in flight")]
    PromptAlreadyInFlight(SessionId),

    #[error("session {0} has no prompt in flight")]
    NoPromptInFlight(SessionId),
}

impl ProtocolError {
    /// Stable finding code
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::UnexpectedMessage { .. } => "PROTOCOL.UNEXPECTED_MESSAGE",
            ProtocolError::DuplicateInitialize => "PROTOCOL.DUPLICATE_INITIALIZE",
            ProtocolError::InitializeResultWithoutRequest { .. } => {
                "PROTOCOL.INITIALIZE_RESULT_WITHOUT_REQUEST"
            }
            ProtocolError::SessionAlreadyExists(_) => "PROTOCOL.SESSION_ALREADY_EXISTS",
            ProtocolError::UnknownSession(_) => "PROTOCOL.UNKNOWN_SESSION",
            ProtocolError::PromptAlreadyInFlight(_) => "PROTOCOL.PROMPT_ALREADY_IN_FLIGHT",
            ProtocolError::NoPromptInFlight(_) => "PROTOCOL.NO_PROMPT_IN_FLIGHT",
        }
    }

    /// Session named by the error, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            ProtocolError::SessionAlreadyExists(id)
            | ProtocolError::UnknownSession(id)
            | ProtocolError::PromptAlreadyInFlight(id)
            | ProtocolError::NoPromptInFlight(id) => Some(id),
            _ => None,
        }
    }
}

impl ToJsonRpcError for ProtocolError {
    fn to_json_rpc_code(&self) -> i32 {
        match self {
            ProtocolError::UnknownSession(_) => json_rpc_codes::RESOURCE_NOT_FOUND,
            _ => json_rpc_codes::INVALID_REQUEST,
        }
    }

    fn to_error_data(&self) -> Option<Value> {
        Some(json!({ "code": self.code() }))
    }
}

/// Failure of a [`crate::transport::Transport`]
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport closed")]
    Closed,

    #[error("frame exceeds the {limit} byte limit")]
    FrameTooLarge { limit: usize },

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of a live connection call
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to encode outgoing message: {0}")]
    EncodeFailed(#[from] EncodeError),

    #[error("failed to decode incoming frame: {0}")]
    DecodeFailed(#[from] DecodeError),

    #[error("transport closed")]
    TransportClosed,

    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("peer returned error: {0}")]
    Rpc(JsonRpcError),

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("expected a {expected} response, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: String,
    },
}

impl From<TransportError> for ConnectionError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => ConnectionError::TransportClosed,
            other => ConnectionError::Transport(other),
        }
    }
}

impl ToJsonRpcError for ConnectionError {
    fn to_json_rpc_code(&self) -> i32 {
        match self {
            ConnectionError::DecodeFailed(err) => err.to_json_rpc_code(),
            ConnectionError::Protocol(err) => err.to_json_rpc_code(),
            ConnectionError::Rpc(err) => err.code,
            _ => json_rpc_codes::INTERNAL_ERROR,
        }
    }

    fn to_error_data(&self) -> Option<Value> {
        match self {
            ConnectionError::Protocol(err) => err.to_error_data(),
            ConnectionError::Rpc(err) => err.data.clone(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_rpc_error_wire_shape() {
        let err = JsonRpcError::method_not_found("_zed/ping");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({"code": -32601, "message": "Method not found: _zed/ping"})
        );

        let parsed: JsonRpcError =
            serde_json::from_value(json!({"code": -32000, "message": "auth", "data": [1]}))
                .unwrap();
        assert_eq!(parsed.data, Some(json!([1])));
    }

    #[test]
    fn test_decode_error_codes() {
        assert_eq!(
            DecodeError::InvalidJson("eof".into()).to_json_rpc_code(),
            json_rpc_codes::PARSE_ERROR
        );
        assert_eq!(
            DecodeError::InvalidParams {
                method: "session/prompt".into(),
                reason: "missing prompt".into()
            }
            .to_json_rpc_code(),
            json_rpc_codes::INVALID_PARAMS
        );
        assert_eq!(
            DecodeError::WrongDirection {
                direction: Direction::FromAgent,
                method: "initialize".into()
            }
            .to_json_rpc_code(),
            json_rpc_codes::METHOD_NOT_FOUND
        );
    }

    #[test]
    fn test_protocol_error_carries_finding_code() {
        let err = ProtocolError::PromptAlreadyInFlight(SessionId::new("s1"));
        assert_eq!(err.code(), "PROTOCOL.PROMPT_ALREADY_IN_FLIGHT");
        assert_eq!(err.session_id().map(SessionId::as_str), Some("s1"));

        let rpc = err.to_json_rpc_error();
        assert_eq!(rpc.code, json_rpc_codes::INVALID_REQUEST);
        assert_eq!(rpc.data, Some(json!({"code": "PROTOCOL.PROMPT_ALREADY_IN_FLIGHT"})));
        assert_eq!(rpc.message, "session s1 already has a prompt in flight");
    }

    #[test]
    fn test_transport_closed_maps_to_connection_closed() {
        let err: ConnectionError = TransportError::Closed.into();
        assert!(matches!(err, ConnectionError::TransportClosed));

        let err: ConnectionError = TransportError::FrameTooLarge { limit: 5 }.into();
        assert!(matches!(err, ConnectionError::Transport(_)));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            EncodeError::MissingRequestId {
                method: "session/new".into()
            }
            .to_string(),
            "session/new requires a request id"
        );
        assert_eq!(
            ConnectionError::Timeout {
                method: "session/prompt".into(),
                after: Duration::from_millis(50)
            }
            .to_string(),
            "session/prompt timed out after 50ms"
        );
    }
}
