//! Frame transports
//!
//! A transport moves whole JSON-RPC frames. It knows nothing about their
//! contents; the connection layer encodes and decodes on top of it.

pub mod duplex;
pub mod line;
pub mod memory;
pub mod recording;

pub use duplex::DuplexTransport;
pub use line::LineTransport;
pub use memory::MemoryTransport;
pub use recording::{FrameDirection, RecordedFrame, Recording, RecordingTransport};

use crate::error::TransportError;
use async_trait::async_trait;
use std::sync::Arc;

/// Default upper bound for one frame: 16 MiB
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Send/receive/close contract shared by every transport.
///
/// All methods take `&self` so one transport can be driven by a read loop
/// and any number of concurrent senders.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one frame for the peer
    async fn send(&self, frame: String) -> Result<(), TransportError>;

    /// Next frame from the peer, `None` once the transport is closed
    async fn receive(&self) -> Result<Option<String>, TransportError>;

    /// Close the transport, releasing every pending and future `receive`
    async fn close(&self) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        (**self).send(frame).await
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        (**self).receive().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        (**self).close().await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        (**self).send(frame).await
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        (**self).receive().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        (**self).close().await
    }
}
