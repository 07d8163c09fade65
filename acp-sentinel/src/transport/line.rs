//! Newline-delimited JSON over any async byte stream
//!
//! One frame per line. Frames larger than the configured limit are rejected
//! without buffering them in full.

use super::{Transport, DEFAULT_MAX_FRAME_BYTES};
use crate::error::TransportError;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;

pub struct LineTransport<R, W> {
    reader: Mutex<FramedRead<R, LinesCodec>>,
    writer: Mutex<W>,
    max_frame_bytes: usize,
    closed: CancellationToken,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_max_frame_bytes(reader, writer, DEFAULT_MAX_FRAME_BYTES)
    }

    pub fn with_max_frame_bytes(reader: R, writer: W, max_frame_bytes: usize) -> Self {
        Self {
            reader: Mutex::new(FramedRead::new(
                reader,
                LinesCodec::new_with_max_length(max_frame_bytes),
            )),
            writer: Mutex::new(writer),
            max_frame_bytes,
            closed: CancellationToken::new(),
        }
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

impl LineTransport<tokio::io::Stdin, tokio::io::Stdout> {
    /// Transport over the process's stdin and stdout
    pub fn stdio(max_frame_bytes: usize) -> Self {
        Self::with_max_frame_bytes(tokio::io::stdin(), tokio::io::stdout(), max_frame_bytes)
    }
}

#[async_trait]
impl<R, W> Transport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Err(TransportError::Closed);
        }
        if frame.len() > self.max_frame_bytes {
            return Err(TransportError::FrameTooLarge {
                limit: self.max_frame_bytes,
            });
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(format!("{}\n", frame).as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>, TransportError> {
        let mut reader = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Ok(None),
            reader = self.reader.lock() => reader,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Ok(None),
                next = reader.next() => next,
            };

            match next {
                None => return Ok(None),
                Some(Ok(line)) => {
                    let line = line.trim_end_matches('\r');
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Ok(Some(line.to_string()));
                }
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    tracing::warn!(
                        "[line] dropped a frame over the {} byte limit",
                        self.max_frame_bytes
                    );
                    return Err(TransportError::FrameTooLarge {
                        limit: self.max_frame_bytes,
                    });
                }
                Some(Err(LinesCodecError::Io(err))) => return Err(TransportError::Io(err)),
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.is_cancelled() {
            return Ok(());
        }
        self.closed.cancel();
        let mut writer = self.writer.lock().await;
        writer.shutdown().await?;
        Ok(())
    }
}
