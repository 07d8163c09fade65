//! Frame to message decoding

use super::pending::{CodecState, PendingAgentRequest, PendingClientRequest};
use crate::error::{DecodeError, JsonRpcError};
use crate::message::{
    Direction, FromAgent, FromClient, Message, MessageKind, ModeSetResult, SessionScoped,
    TerminalScoped,
};
use crate::schema::methods;
use crate::schema::RequestId;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Decode one raw frame sent in `direction`.
///
/// Returns the successor codec state alongside the message; `state` itself is
/// never modified, so a failed decode leaves the caller's state as it was.
pub fn decode(
    direction: Direction,
    state: &CodecState,
    raw: &str,
) -> Result<(CodecState, Message), DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    decode_value(direction, state, value)
}

/// Decode an already parsed frame
pub fn decode_value(
    direction: Direction,
    state: &CodecState,
    value: Value,
) -> Result<(CodecState, Message), DecodeError> {
    let envelope = Envelope::parse(value)?;
    let mut next = state.clone();

    let message = match envelope {
        Envelope::Notification { method, params } => match direction {
            Direction::FromClient => Message::FromClient(client_notification(method, params)?),
            Direction::FromAgent => Message::FromAgent(agent_notification(method, params)?),
        },
        Envelope::Request { id, method, params } => match direction {
            Direction::FromClient => {
                if next.pending_client_requests.contains_key(&id) {
                    return Err(DecodeError::DuplicateRequestId { direction, id });
                }
                let message = client_request(method, params)?;
                if let Some(pending) = PendingClientRequest::for_message(&message) {
                    next.pending_client_requests.insert(id, pending);
                }
                Message::FromClient(message)
            }
            Direction::FromAgent => {
                if next.pending_agent_requests.contains_key(&id) {
                    return Err(DecodeError::DuplicateRequestId { direction, id });
                }
                let message = agent_request(method, params)?;
                if let Some(pending) = PendingAgentRequest::for_message(&message) {
                    next.pending_agent_requests.insert(id, pending);
                }
                Message::FromAgent(message)
            }
        },
        Envelope::Response { id, outcome } => match direction {
            // the agent answers requests the client sent
            Direction::FromAgent => {
                let pending = next
                    .pending_client_requests
                    .remove(&id)
                    .ok_or(DecodeError::UnknownRequestId { id })?;
                Message::FromAgent(agent_response(pending, outcome)?)
            }
            Direction::FromClient => {
                let pending = next
                    .pending_agent_requests
                    .remove(&id)
                    .ok_or(DecodeError::UnknownRequestId { id })?;
                Message::FromClient(client_response(pending, outcome)?)
            }
        },
    };

    Ok((next, message))
}

/// Wire id of a frame, without decoding its body
pub fn peek_id(value: &Value) -> Option<RequestId> {
    value.get("id").and_then(RequestId::from_value)
}

/// Frame shape, judged from the envelope keys alone
pub fn peek_kind(value: &Value) -> Option<MessageKind> {
    let object = value.as_object()?;
    let has_id = object.contains_key("id");
    if object.contains_key("method") {
        Some(if has_id {
            MessageKind::Request
        } else {
            MessageKind::Notification
        })
    } else if has_id && (object.contains_key("result") || object.contains_key("error")) {
        Some(MessageKind::Response)
    } else {
        None
    }
}

/// Method named by a frame, if it carries one
pub fn peek_method(value: &Value) -> Option<&str> {
    value.get("method").and_then(Value::as_str)
}

enum Envelope {
    Notification {
        method: String,
        params: Value,
    },
    Request {
        id: RequestId,
        method: String,
        params: Value,
    },
    Response {
        id: RequestId,
        outcome: Result<Value, Value>,
    },
}

impl Envelope {
    fn parse(value: Value) -> Result<Self, DecodeError> {
        let Value::Object(mut object) = value else {
            return Err(DecodeError::InvalidJsonRpc(
                "frame is not a JSON object".to_string(),
            ));
        };

        match object.get("jsonrpc") {
            Some(Value::String(version)) if version == "2.0" => {}
            _ => {
                return Err(DecodeError::InvalidJsonRpc(
                    "jsonrpc must be \"2.0\"".to_string(),
                ))
            }
        }

        let id = match object.remove("id") {
            None => None,
            Some(raw) => Some(RequestId::from_value(&raw).ok_or_else(|| {
                DecodeError::InvalidJsonRpc(format!("invalid request id {}", raw))
            })?),
        };
        let method = object.remove("method");
        let result = object.remove("result");
        let error = object.remove("error");

        match (method, id, result, error) {
            (Some(Value::String(method)), id, None, None) => {
                let params = object.remove("params").unwrap_or(Value::Null);
                Ok(match id {
                    Some(id) => Envelope::Request { id, method, params },
                    None => Envelope::Notification { method, params },
                })
            }
            (Some(Value::String(_)), _, _, _) => Err(DecodeError::InvalidJsonRpc(
                "request carries a result or error".to_string(),
            )),
            (Some(_), _, _, _) => Err(DecodeError::InvalidJsonRpc(
                "method must be a string".to_string(),
            )),
            (None, Some(id), Some(result), None) => Ok(Envelope::Response {
                id,
                outcome: Ok(result),
            }),
            (None, Some(id), None, Some(error)) => Ok(Envelope::Response {
                id,
                outcome: Err(error),
            }),
            (None, Some(_), Some(_), Some(_)) => Err(DecodeError::InvalidJsonRpc(
                "response carries both result and error".to_string(),
            )),
            _ => Err(DecodeError::InvalidJsonRpc(
                "frame is neither a request, a notification nor a response".to_string(),
            )),
        }
    }
}

/// Empty or absent bodies decode as `{}` so unit-like payloads accept `null`
fn object_or_empty(value: Value) -> Value {
    if value.is_null() {
        Value::Object(Map::new())
    } else {
        value
    }
}

fn params<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(object_or_empty(value)).map_err(|e| DecodeError::InvalidParams {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn result<T: DeserializeOwned>(method: &str, value: Value) -> Result<T, DecodeError> {
    serde_json::from_value(object_or_empty(value)).map_err(|e| DecodeError::InvalidResult {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn error_object(value: Value) -> Result<JsonRpcError, DecodeError> {
    serde_json::from_value(value).map_err(|e| DecodeError::InvalidErrorObject(e.to_string()))
}

fn misplaced(method: String, direction: Direction, kind: MessageKind) -> DecodeError {
    let belongs_to_peer = match direction {
        Direction::FromClient => methods::is_agent_method(&method),
        Direction::FromAgent => methods::is_client_method(&method),
    };
    if belongs_to_peer {
        DecodeError::WrongDirection { direction, method }
    } else {
        let reason = match kind {
            MessageKind::Request => format!("{} is a notification but carries an id", method),
            _ => format!("{} is a request but carries no id", method),
        };
        DecodeError::InvalidJsonRpc(reason)
    }
}

fn is_known(method: &str) -> bool {
    methods::is_client_method(method) || methods::is_agent_method(method)
}

fn client_request(method: String, value: Value) -> Result<FromClient, DecodeError> {
    let message = match method.as_str() {
        methods::INITIALIZE => FromClient::InitializeRequest(params(&method, value)?),
        methods::AUTHENTICATE => FromClient::AuthenticateRequest(params(&method, value)?),
        methods::SESSION_NEW => FromClient::SessionNewRequest(params(&method, value)?),
        methods::SESSION_LOAD => FromClient::SessionLoadRequest(params(&method, value)?),
        methods::SESSION_PROMPT => FromClient::SessionPromptRequest(params(&method, value)?),
        methods::SESSION_SET_MODE => FromClient::SessionSetModeRequest(params(&method, value)?),
        m if is_known(m) => {
            return Err(misplaced(method, Direction::FromClient, MessageKind::Request))
        }
        _ => FromClient::ExtRequest {
            method,
            params: value,
        },
    };
    Ok(message)
}

fn client_notification(method: String, value: Value) -> Result<FromClient, DecodeError> {
    let message = match method.as_str() {
        methods::SESSION_CANCEL => FromClient::SessionCancel(params(&method, value)?),
        m if is_known(m) => {
            return Err(misplaced(
                method,
                Direction::FromClient,
                MessageKind::Notification,
            ))
        }
        _ => FromClient::ExtNotification {
            method,
            params: value,
        },
    };
    Ok(message)
}

fn agent_request(method: String, value: Value) -> Result<FromAgent, DecodeError> {
    let message = match method.as_str() {
        methods::FS_READ_TEXT_FILE => FromAgent::ReadTextFileRequest(params(&method, value)?),
        methods::FS_WRITE_TEXT_FILE => FromAgent::WriteTextFileRequest(params(&method, value)?),
        methods::SESSION_REQUEST_PERMISSION => {
            FromAgent::RequestPermissionRequest(params(&method, value)?)
        }
        methods::TERMINAL_CREATE => FromAgent::CreateTerminalRequest(params(&method, value)?),
        methods::TERMINAL_OUTPUT => FromAgent::TerminalOutputRequest(params(&method, value)?),
        methods::TERMINAL_WAIT_FOR_EXIT => {
            FromAgent::WaitForTerminalExitRequest(params(&method, value)?)
        }
        methods::TERMINAL_KILL => FromAgent::KillTerminalRequest(params(&method, value)?),
        methods::TERMINAL_RELEASE => FromAgent::ReleaseTerminalRequest(params(&method, value)?),
        m if is_known(m) => {
            return Err(misplaced(method, Direction::FromAgent, MessageKind::Request))
        }
        _ => FromAgent::ExtRequest {
            method,
            params: value,
        },
    };
    Ok(message)
}

fn agent_notification(method: String, value: Value) -> Result<FromAgent, DecodeError> {
    let message = match method.as_str() {
        methods::SESSION_UPDATE => FromAgent::SessionUpdate(params(&method, value)?),
        m if is_known(m) => {
            return Err(misplaced(
                method,
                Direction::FromAgent,
                MessageKind::Notification,
            ))
        }
        _ => FromAgent::ExtNotification {
            method,
            params: value,
        },
    };
    Ok(message)
}

/// Rebuild the agent's answer to a client request, splicing back the context
/// the wire result leaves out
fn agent_response(
    pending: PendingClientRequest,
    outcome: Result<Value, Value>,
) -> Result<FromAgent, DecodeError> {
    let value = match outcome {
        Ok(value) => value,
        Err(error) => {
            return Ok(FromAgent::ClientRequestError {
                request: pending,
                error: error_object(error)?,
            })
        }
    };

    let method = pending.method().to_string();
    let message = match pending {
        PendingClientRequest::Initialize => FromAgent::InitializeResult(result(&method, value)?),
        PendingClientRequest::Authenticate => {
            FromAgent::AuthenticateResult(result(&method, value)?)
        }
        PendingClientRequest::SessionNew => FromAgent::SessionNewResult(result(&method, value)?),
        PendingClientRequest::SessionLoad(session_id) => {
            FromAgent::SessionLoadResult(SessionScoped {
                session_id,
                response: result(&method, value)?,
            })
        }
        PendingClientRequest::SessionPrompt(session_id) => {
            FromAgent::SessionPromptResult(SessionScoped {
                session_id,
                response: result(&method, value)?,
            })
        }
        PendingClientRequest::SessionSetMode {
            session_id,
            mode_id,
        } => FromAgent::SessionSetModeResult(ModeSetResult {
            session_id,
            mode_id,
            response: result(&method, value)?,
        }),
        PendingClientRequest::Ext(method) => FromAgent::ExtResponse {
            method,
            result: value,
        },
    };
    Ok(message)
}

fn client_response(
    pending: PendingAgentRequest,
    outcome: Result<Value, Value>,
) -> Result<FromClient, DecodeError> {
    let value = match outcome {
        Ok(value) => value,
        Err(error) => {
            return Ok(FromClient::AgentRequestError {
                request: pending,
                error: error_object(error)?,
            })
        }
    };

    let method = pending.method().to_string();
    let message = match pending {
        PendingAgentRequest::ReadTextFile(session_id) => {
            FromClient::ReadTextFileResult(SessionScoped {
                session_id,
                response: result(&method, value)?,
            })
        }
        PendingAgentRequest::WriteTextFile(session_id) => {
            FromClient::WriteTextFileResult(SessionScoped {
                session_id,
                response: result(&method, value)?,
            })
        }
        PendingAgentRequest::RequestPermission(session_id) => {
            FromClient::RequestPermissionResult(SessionScoped {
                session_id,
                response: result(&method, value)?,
            })
        }
        PendingAgentRequest::CreateTerminal(session_id) => {
            FromClient::CreateTerminalResult(SessionScoped {
                session_id,
                response: result(&method, value)?,
            })
        }
        PendingAgentRequest::TerminalOutput {
            session_id,
            terminal_id,
        } => FromClient::TerminalOutputResult(TerminalScoped {
            session_id,
            terminal_id,
            response: result(&method, value)?,
        }),
        PendingAgentRequest::WaitForTerminalExit {
            session_id,
            terminal_id,
        } => FromClient::WaitForTerminalExitResult(TerminalScoped {
            session_id,
            terminal_id,
            response: result(&method, value)?,
        }),
        PendingAgentRequest::KillTerminal {
            session_id,
            terminal_id,
        } => FromClient::KillTerminalResult(TerminalScoped {
            session_id,
            terminal_id,
            response: result(&method, value)?,
        }),
        PendingAgentRequest::ReleaseTerminal {
            session_id,
            terminal_id,
        } => FromClient::ReleaseTerminalResult(TerminalScoped {
            session_id,
            terminal_id,
            response: result(&method, value)?,
        }),
        PendingAgentRequest::Ext(method) => FromClient::ExtResponse {
            method,
            result: value,
        },
    };
    Ok(message)
}
