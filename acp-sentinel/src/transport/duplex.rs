//! Connected in-process transport pair
//!
//! Frames sent on one end arrive in order on the other. Closing either end
//! closes both.

use super::Transport;
use crate::error::TransportError;
use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct DuplexTransport {
    outbound: mpsc::UnboundedSender<String>,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    closed: CancellationToken,
}

impl DuplexTransport {
    /// Two transports wired back to back
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        let left = Self {
            outbound: a_tx,
            inbound: Mutex::new(b_rx),
            closed: closed.clone(),
        };
        let right = Self {
            outbound: b_tx,
            inbound: Mutex::new(a_rx),
            closed,
        };
        (left, right)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

#[async_trait]
impl Transport for DuplexTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Closed)
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        let mut inbound = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Ok(None),
            inbound = self.inbound.lock() => inbound,
        };
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Ok(None),
            frame = inbound.recv() => Ok(frame),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if !self.closed.is_cancelled() {
            tracing::debug!("[duplex] closing pair");
            self.closed.cancel();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_arrive_in_order() {
        let (left, right) = DuplexTransport::pair();
        for n in 0..5 {
            left.send(format!("frame-{}", n)).await.unwrap();
        }
        for n in 0..5 {
            assert_eq!(right.receive().await.unwrap(), Some(format!("frame-{}", n)));
        }

        right.send("back".into()).await.unwrap();
        assert_eq!(left.receive().await.unwrap().as_deref(), Some("back"));
    }

    #[tokio::test]
    async fn test_close_is_shared() {
        let (left, right) = DuplexTransport::pair();
        right.close().await.unwrap();
        assert!(left.is_closed());
        assert_eq!(left.receive().await.unwrap(), None);
        assert!(matches!(
            left.send("late".into()).await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_dropped_peer_ends_stream() {
        let (left, right) = DuplexTransport::pair();
        drop(right);
        assert_eq!(left.receive().await.unwrap(), None);
        assert!(left.send("x".into()).await.is_err());
    }
}
