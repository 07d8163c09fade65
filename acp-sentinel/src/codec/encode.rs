//! Message to frame encoding

use crate::error::{EncodeError, JsonRpcError};
use crate::message::{FromAgent, FromClient, Message, MessageKind};
use crate::schema::RequestId;
use serde::Serialize;
use serde_json::{Map, Value};

enum Body {
    Params(Value),
    Result(Value),
    Error(JsonRpcError),
}

/// Encode a message as one JSON-RPC frame.
///
/// Requests and responses need the wire id; notifications must not carry one.
pub fn encode(id: Option<&RequestId>, message: &Message) -> Result<String, EncodeError> {
    Ok(encode_value(id, message)?.to_string())
}

pub fn encode_value(id: Option<&RequestId>, message: &Message) -> Result<Value, EncodeError> {
    let method = message.method();
    match (message.kind(), id) {
        (MessageKind::Request | MessageKind::Response, None) => {
            return Err(EncodeError::MissingRequestId {
                method: method.to_string(),
            })
        }
        (MessageKind::Notification, Some(_)) => {
            return Err(EncodeError::UnexpectedRequestId {
                method: method.to_string(),
            })
        }
        _ => {}
    }

    let body = match message {
        Message::FromClient(m) => client_body(m)?,
        Message::FromAgent(m) => agent_body(m)?,
    };

    let mut frame = Map::new();
    frame.insert("jsonrpc".to_string(), Value::from("2.0"));
    if let Some(id) = id {
        frame.insert("id".to_string(), id.to_value());
    }
    match body {
        Body::Params(params) => {
            frame.insert("method".to_string(), Value::from(method));
            if !params.is_null() {
                frame.insert("params".to_string(), params);
            }
        }
        Body::Result(result) => {
            frame.insert("result".to_string(), result);
        }
        Body::Error(error) => {
            frame.insert("error".to_string(), to_value(&error)?);
        }
    }
    Ok(Value::Object(frame))
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, EncodeError> {
    serde_json::to_value(payload).map_err(|e| EncodeError::UnsupportedShape(e.to_string()))
}

fn params<T: Serialize>(payload: &T) -> Result<Body, EncodeError> {
    to_value(payload).map(Body::Params)
}

fn result<T: Serialize>(payload: &T) -> Result<Body, EncodeError> {
    to_value(payload).map(Body::Result)
}

fn client_body(message: &FromClient) -> Result<Body, EncodeError> {
    match message {
        FromClient::InitializeRequest(r) => params(r),
        FromClient::AuthenticateRequest(r) => params(r),
        FromClient::SessionNewRequest(r) => params(r),
        FromClient::SessionLoadRequest(r) => params(r),
        FromClient::SessionPromptRequest(r) => params(r),
        FromClient::SessionSetModeRequest(r) => params(r),
        FromClient::SessionCancel(n) => params(n),
        FromClient::ReadTextFileResult(r) => result(&r.response),
        FromClient::WriteTextFileResult(r) => result(&r.response),
        FromClient::RequestPermissionResult(r) => result(&r.response),
        FromClient::CreateTerminalResult(r) => result(&r.response),
        FromClient::TerminalOutputResult(r) => result(&r.response),
        FromClient::WaitForTerminalExitResult(r) => result(&r.response),
        FromClient::KillTerminalResult(r) => result(&r.response),
        FromClient::ReleaseTerminalResult(r) => result(&r.response),
        FromClient::AgentRequestError { error, .. } => Ok(Body::Error(error.clone())),
        FromClient::ExtRequest { params, .. } | FromClient::ExtNotification { params, .. } => {
            Ok(Body::Params(params.clone()))
        }
        FromClient::ExtResponse { result, .. } => Ok(Body::Result(result.clone())),
    }
}

fn agent_body(message: &FromAgent) -> Result<Body, EncodeError> {
    match message {
        FromAgent::InitializeResult(r) => result(r),
        FromAgent::AuthenticateResult(r) => result(r),
        FromAgent::SessionNewResult(r) => result(r),
        FromAgent::SessionLoadResult(r) => result(&r.response),
        FromAgent::SessionPromptResult(r) => result(&r.response),
        FromAgent::SessionSetModeResult(r) => result(&r.response),
        FromAgent::SessionUpdate(n) => params(n),
        FromAgent::ReadTextFileRequest(r) => params(r),
        FromAgent::WriteTextFileRequest(r) => params(r),
        FromAgent::RequestPermissionRequest(r) => params(r),
        FromAgent::CreateTerminalRequest(r) => params(r),
        FromAgent::TerminalOutputRequest(r)
        | FromAgent::WaitForTerminalExitRequest(r)
        | FromAgent::KillTerminalRequest(r)
        | FromAgent::ReleaseTerminalRequest(r) => params(r),
        FromAgent::ClientRequestError { error, .. } => Ok(Body::Error(error.clone())),
        FromAgent::ExtRequest { params, .. } | FromAgent::ExtNotification { params, .. } => {
            Ok(Body::Params(params.clone()))
        }
        FromAgent::ExtResponse { result, .. } => Ok(Body::Result(result.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::pending::PendingClientRequest;
    use crate::message::SessionScoped;
    use crate::schema::{CancelNotification, PromptResponse, SessionId, StopReason};
    use serde_json::json;

    #[test]
    fn test_notification_frame() {
        let message = Message::FromClient(FromClient::SessionCancel(CancelNotification {
            session_id: "s1".into(),
        }));
        assert_eq!(
            encode_value(None, &message).unwrap(),
            json!({"jsonrpc": "2.0", "method": "session/cancel", "params": {"sessionId": "s1"}})
        );
        assert_eq!(
            encode_value(Some(&RequestId::from(1)), &message),
            Err(EncodeError::UnexpectedRequestId {
                method: "session/cancel".into()
            })
        );
    }

    #[test]
    fn test_scoped_result_drops_context_on_the_wire() {
        let message = Message::FromAgent(FromAgent::SessionPromptResult(SessionScoped::new(
            "s1",
            PromptResponse {
                stop_reason: StopReason::Cancelled,
            },
        )));
        assert_eq!(
            encode_value(Some(&RequestId::from("p")), &message).unwrap(),
            json!({"jsonrpc": "2.0", "id": "p", "result": {"stopReason": "cancelled"}})
        );
        assert!(matches!(
            encode(None, &message),
            Err(EncodeError::MissingRequestId { .. })
        ));
    }

    #[test]
    fn test_error_frame() {
        let message = Message::FromAgent(FromAgent::ClientRequestError {
            request: PendingClientRequest::SessionPrompt(SessionId::new("s1")),
            error: JsonRpcError::auth_required(),
        });
        assert_eq!(
            encode_value(Some(&RequestId::Null), &message).unwrap(),
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32000, "message": "Authentication required"}})
        );
    }

    #[test]
    fn test_extension_payload_is_copied() {
        let mut params = json!({"depth": 1});
        let message = Message::FromClient(FromClient::ExtNotification {
            method: "_acme/poke".into(),
            params: params.clone(),
        });
        let encoded = encode_value(None, &message).unwrap();
        params["depth"] = json!(2);
        assert_eq!(encoded["params"], json!({"depth": 1}));

        let bare = Message::FromClient(FromClient::ExtNotification {
            method: "_acme/tick".into(),
            params: Value::Null,
        });
        assert_eq!(
            encode_value(None, &bare).unwrap(),
            json!({"jsonrpc": "2.0", "method": "_acme/tick"})
        );
    }
}
