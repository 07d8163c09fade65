//! ACP Sentinel
//!
//! Engine for observing and driving Agent Client Protocol traffic: a wire
//! codec that correlates JSON-RPC requests with their responses, a pure
//! protocol state machine, a validation engine that replays message traces
//! into structured findings, and an async connection layer over pluggable
//! frame transports.

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod json_rpc_codes;
pub mod message;
pub mod protocol;
pub mod schema;
pub mod transport;
pub mod validation;

pub use codec::{decode, encode, CodecState};
pub use config::{ConfigError, SentinelConfig};
pub use connection::{
    Agent, AgentSideConnection, Client, ClientSideConnection, ConnectionOptions,
};
pub use error::{
    ConnectionError, DecodeError, EncodeError, JsonRpcError, ProtocolError, Result,
    ToJsonRpcError, TransportError,
};
pub use message::{Direction, FromAgent, FromClient, Message, MessageKind};
pub use protocol::{Phase, ProtocolSpec};
pub use transport::{DuplexTransport, LineTransport, MemoryTransport, Transport};
pub use validation::{
    DomainProfile, EvalProfile, Lane, Severity, ValidationFinding, ValidationOptions,
    ValidationReport,
};
