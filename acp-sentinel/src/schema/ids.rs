//! Identifier newtypes shared by requests, results and notifications.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Agent-assigned identifier of a conversation session
    SessionId
);
string_id!(
    /// Identifier of a session mode such as `default` or `plan`
    SessionModeId
);
string_id!(
    /// Agent-assigned identifier of a tool call within a session
    ToolCallId
);
string_id!(
    /// Client-assigned identifier of a terminal created for the agent
    TerminalId
);
string_id!(
    /// Identifier of one option offered in a permission request
    PermissionOptionId
);
string_id!(
    /// Identifier of an authentication method advertised by the agent
    AuthMethodId
);

/// JSON-RPC request identifier.
///
/// The wire allows a number, a string, or an explicit `null`. Notifications
/// carry no id at all, which is modelled as `Option<RequestId>::None` by callers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Null,
    Number(i64),
    Str(String),
}

impl RequestId {
    /// Parse an id from a JSON value, rejecting floats, objects and arrays.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(RequestId::Null),
            serde_json::Value::Number(n) => n.as_i64().map(RequestId::Number),
            serde_json::Value::String(s) => Some(RequestId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            RequestId::Null => serde_json::Value::Null,
            RequestId::Number(n) => serde_json::Value::from(*n),
            RequestId::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Null => f.write_str("null"),
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        RequestId::Str(value.to_string())
    }
}

/// ACP protocol version negotiated during `initialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolVersion(pub u16);

impl ProtocolVersion {
    pub const V1: ProtocolVersion = ProtocolVersion(1);
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::V1
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_id_from_value() {
        assert_eq!(RequestId::from_value(&json!(7)), Some(RequestId::Number(7)));
        assert_eq!(
            RequestId::from_value(&json!("abc")),
            Some(RequestId::Str("abc".to_string()))
        );
        assert_eq!(RequestId::from_value(&json!(null)), Some(RequestId::Null));
        assert_eq!(RequestId::from_value(&json!(1.5)), None);
        assert_eq!(RequestId::from_value(&json!({"id": 1})), None);
    }

    #[test]
    fn test_request_id_value_round_trip() {
        for id in [
            RequestId::Null,
            RequestId::Number(-3),
            RequestId::Str("x-1".to_string()),
        ] {
            assert_eq!(RequestId::from_value(&id.to_value()), Some(id));
        }
    }

    #[test]
    fn test_session_id_serializes_as_plain_string() {
        let id = SessionId::new("sess-001");
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("sess-001"));
        assert_eq!(id.to_string(), "sess-001");
    }
}
