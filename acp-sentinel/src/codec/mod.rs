//! JSON-RPC 2.0 wire codec
//!
//! [`decode`] turns a raw frame into a [`Message`](crate::message::Message)
//! and threads a [`CodecState`] that remembers every outstanding request per
//! direction. Responses are matched against that table so their typed result
//! can carry the context the wire form omits. [`encode`] is the inverse and
//! never touches codec state.

pub mod decode;
pub mod encode;
pub mod pending;

pub use decode::{decode, decode_value, peek_id, peek_kind, peek_method};
pub use encode::{encode, encode_value};
pub use pending::{CodecState, PendingAgentRequest, PendingClientRequest};

use crate::message::Direction;
use crate::schema::RequestId;

impl CodecState {
    /// Drop the pending entry a response frame from `direction` would resolve.
    ///
    /// Used when a response is correlated by id but its body fails to decode.
    pub fn forget_response(&mut self, direction: Direction, id: &RequestId) -> bool {
        match direction {
            Direction::FromAgent => self.pending_client_requests.remove(id).is_some(),
            Direction::FromClient => self.pending_agent_requests.remove(id).is_some(),
        }
    }
}
