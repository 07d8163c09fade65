//! Live ACP connections
//!
//! A [`ClientSideConnection`] lets a client call into an agent while its own
//! [`Client`] handler answers the agent's requests; an
//! [`AgentSideConnection`] is the mirror image. Both sides share one core
//! that matches responses to callers by request id, so replies may arrive in
//! any order.

mod agent_side;
mod client_side;
mod core;
pub mod handlers;

pub use agent_side::AgentSideConnection;
pub use client_side::ClientSideConnection;
pub use handlers::{Agent, Client, HandlerResult};

use crate::error::ConnectionError;
use crate::message::Message;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Upper bound on waiting for any single response; `None` waits forever
    pub request_timeout: Option<Duration>,
    /// Fold every sent and received message through the protocol state
    /// machine and refuse outbound calls that would break it
    pub enforce_protocol: bool,
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn enforce_protocol(mut self, enforce: bool) -> Self {
        self.enforce_protocol = enforce;
        self
    }
}

/// Error for a reply that does not answer the request it was matched to
fn unexpected_response(expected: &'static str, message: Message) -> ConnectionError {
    use crate::message::{FromAgent, FromClient};

    match message {
        Message::FromAgent(FromAgent::ClientRequestError { error, .. })
        | Message::FromClient(FromClient::AgentRequestError { error, .. }) => {
            ConnectionError::Rpc(error)
        }
        other => ConnectionError::UnexpectedResponse {
            expected,
            actual: other.method().to_string(),
        },
    }
}
