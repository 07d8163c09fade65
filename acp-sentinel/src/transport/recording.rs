//! Frame recorder wrapping any transport
//!
//! Every frame that crosses the inner transport is kept in memory in the
//! order it was seen. A [`Recording`] handle can be cloned out before the
//! transport is moved into a connection, and rendered later as the JSONL
//! trace format read by `acp-sentinel validate`.

use super::Transport;
use crate::error::TransportError;
use crate::message::Direction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameDirection {
    Sent,
    Received,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub direction: FrameDirection,
    pub frame: String,
}

/// Shared view of the frames recorded so far
#[derive(Debug, Clone, Default)]
pub struct Recording {
    frames: Arc<Mutex<Vec<RecordedFrame>>>,
}

impl Recording {
    fn lock(&self) -> MutexGuard<'_, Vec<RecordedFrame>> {
        self.frames.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, direction: FrameDirection, frame: &str) {
        self.lock().push(RecordedFrame {
            direction,
            frame: frame.to_string(),
        });
    }

    pub fn frames(&self) -> Vec<RecordedFrame> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Render as trace lines of `{"from": "client"|"agent", "frame": ...}`.
    ///
    /// `local` is the side that owned the recorded transport; its sent
    /// frames are attributed to it and received frames to its peer.
    pub fn to_jsonl(&self, local: Direction) -> String {
        self.lock()
            .iter()
            .map(|recorded| {
                let origin = match recorded.direction {
                    FrameDirection::Sent => local,
                    FrameDirection::Received => local.opposite(),
                };
                let from = match origin {
                    Direction::FromClient => "client",
                    Direction::FromAgent => "agent",
                };
                let frame = serde_json::from_str::<Value>(&recorded.frame)
                    .unwrap_or_else(|_| Value::String(recorded.frame.clone()));
                format!("{}\n", json!({ "from": from, "frame": frame }))
            })
            .collect()
    }
}

pub struct RecordingTransport<T> {
    inner: T,
    recording: Recording,
}

impl<T: Transport> RecordingTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            recording: Recording::default(),
        }
    }

    pub fn recording(&self) -> Recording {
        self.recording.clone()
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[async_trait]
impl<T: Transport> Transport for RecordingTransport<T> {
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        self.recording.record(FrameDirection::Sent, &frame);
        self.inner.send(frame).await
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        let frame = self.inner.receive().await?;
        if let Some(frame) = &frame {
            self.recording.record(FrameDirection::Received, frame);
        }
        Ok(frame)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::DuplexTransport;

    #[tokio::test]
    async fn test_records_both_directions_in_order() {
        let (left, right) = DuplexTransport::pair();
        let recorder = RecordingTransport::new(left);
        let recording = recorder.recording();

        recorder
            .send(r#"{"jsonrpc":"2.0","id":0,"method":"initialize","params":{}}"#.into())
            .await
            .unwrap();
        right
            .send(r#"{"jsonrpc":"2.0","id":0,"result":{}}"#.into())
            .await
            .unwrap();
        recorder.receive().await.unwrap();

        let frames = recording.frames();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].direction, FrameDirection::Sent);
        assert_eq!(frames[1].direction, FrameDirection::Received);
    }

    #[tokio::test]
    async fn test_jsonl_attributes_frames_to_sides() {
        let (left, right) = DuplexTransport::pair();
        let recorder = RecordingTransport::new(left);
        recorder.send(r#"{"id":1}"#.into()).await.unwrap();
        right.send("not json".into()).await.unwrap();
        recorder.receive().await.unwrap();

        let lines: Vec<Value> = recorder
            .recording()
            .to_jsonl(Direction::FromClient)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines[0], json!({"from": "client", "frame": {"id": 1}}));
        assert_eq!(lines[1], json!({"from": "agent", "frame": "not json"}));
    }
}
