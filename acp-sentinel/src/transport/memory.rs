//! In-memory transport for tests
//!
//! Inbound frames are scripted with [`MemoryTransport::push_inbound`]; every
//! frame sent is kept for inspection.

use super::Transport;
use crate::error::TransportError;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};

#[derive(Debug, Default)]
struct MemoryState {
    inbound: VecDeque<String>,
    sent: Vec<String>,
    closed: bool,
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    state: Mutex<MemoryState>,
    notify: Notify,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose inbound queue starts with `frames`
    pub fn with_inbound<I, S>(frames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let transport = Self::new();
        transport
            .state
            .try_lock()
            .map(|mut state| state.inbound.extend(frames.into_iter().map(Into::into)))
            .ok();
        transport
    }

    pub async fn push_inbound(&self, frame: impl Into<String>) {
        self.state.lock().await.inbound.push_back(frame.into());
        self.notify.notify_waiters();
    }

    /// Every frame sent so far, oldest first
    pub async fn sent(&self) -> Vec<String> {
        self.state.lock().await.sent.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(TransportError::Closed);
        }
        tracing::debug!("[memory] send {} bytes", frame.len());
        state.sent.push(frame);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        loop {
            // registered before the check so a push in between is not missed
            let notified = self.notify.notified();
            {
                let mut state = self.state.lock().await;
                if let Some(frame) = state.inbound.pop_front() {
                    return Ok(Some(frame));
                }
                if state.closed {
                    return Ok(None);
                }
            }
            notified.await;
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
        Ok(())
    }
}
