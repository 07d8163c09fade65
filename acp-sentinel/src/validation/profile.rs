//! Domain profile: content policy applied to every message of a trace

use super::finding::{Lane, Severity, Subject, ValidationFinding};
use crate::codec::encode;
use crate::message::{Message, MessageKind};
use crate::schema::RequestId;
use serde::{Deserialize, Serialize};

pub const EXTENSION_CONTENT_DISALLOWED: &str = "TRANSPORT.EXTENSION_CONTENT_DISALLOWED";
pub const EXTENSION_KIND_NOT_ALLOWED: &str = "TRANSPORT.EXTENSION_KIND_NOT_ALLOWED";
pub const MESSAGE_TOO_LARGE: &str = "TRANSPORT.MESSAGE_TOO_LARGE";

/// How non-standard content block kinds are treated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataPolicy {
    /// Any non-standard kind is a violation
    Disallow,
    /// Non-standard kinds pass through unexamined
    #[default]
    AllowOpaque,
    /// Only the listed kinds are accepted
    AllowKinds(Vec<String>),
}

/// Policy supplied by the embedding runtime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DomainProfile {
    pub metadata: MetadataPolicy,
    /// Upper bound on the encoded size of one frame
    pub max_message_bytes: Option<usize>,
}

impl DomainProfile {
    pub fn new(metadata: MetadataPolicy) -> Self {
        Self {
            metadata,
            max_message_bytes: None,
        }
    }

    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = Some(limit);
        self
    }

    /// Content findings for the message at `index`
    pub fn check(&self, index: usize, message: &Message) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();

        for block in message.content_blocks() {
            if !block.is_extension() {
                continue;
            }
            let kind = block.kind();
            let violation = match &self.metadata {
                MetadataPolicy::AllowOpaque => None,
                MetadataPolicy::Disallow => Some((
                    EXTENSION_CONTENT_DISALLOWED,
                    format!("non-standard content kind '{}' is not allowed", kind),
                )),
                MetadataPolicy::AllowKinds(allowed) if allowed.iter().any(|k| k == kind) => None,
                MetadataPolicy::AllowKinds(_) => Some((
                    EXTENSION_KIND_NOT_ALLOWED,
                    format!("content kind '{}' is not in the allowed list", kind),
                )),
            };
            if let Some((code, description)) = violation {
                findings.push(
                    ValidationFinding::new(
                        Lane::Transport,
                        Severity::Error,
                        code,
                        description,
                        Subject::message_at(index, message),
                    )
                    .with_session(message.session_id())
                    .at_index(index),
                );
            }
        }

        if let (Some(limit), Some(size)) = (self.max_message_bytes, wire_size(message)) {
            if size > limit {
                findings.push(
                    ValidationFinding::new(
                        Lane::Transport,
                        Severity::Error,
                        MESSAGE_TOO_LARGE,
                        format!("{} byte frame exceeds the {} byte limit", size, limit),
                        Subject::message_at(index, message),
                    )
                    .with_session(message.session_id())
                    .at_index(index),
                );
            }
        }

        findings
    }
}

/// Encoded size of a message, measured with a `null` id where one is needed
pub fn wire_size(message: &Message) -> Option<usize> {
    let id = match message.kind() {
        MessageKind::Notification => None,
        MessageKind::Request | MessageKind::Response => Some(RequestId::Null),
    };
    encode(id.as_ref(), message).ok().map(|frame| frame.len())
}
