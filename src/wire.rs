//! Length-prefixed message framing for the coordinator channel.
//!
//! Frame layout: 8-byte protocol magic, 4-byte big-endian payload length,
//! bincode payload. On receive the magic bytes are consumed but only the
//! length is interpreted. A timeout or a cleanly closed peer yields
//! `Ok(None)` rather than an error; the state machine decides what a
//! missing message means at each phase.

use crate::error::FusionError;
use crate::params::{MAGIC, MAX_MESSAGE_SIZE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub struct FramedConn<S> {
    stream: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> FramedConn<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Frame and send one message, flushing before returning. A write
    /// failure is fatal to the session; there is no partial-write recovery.
    pub async fn send<M: Serialize>(&mut self, msg: &M) -> Result<(), FusionError> {
        let body = bincode::serialize(msg).expect("Serialization failed");
        let mut frame = Vec::with_capacity(12 + body.len());
        frame.extend_from_slice(&MAGIC);
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Receive one message, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` on timeout or peer close, `Err(Protocol)` when
    /// the payload fails to decode, `Err(Transport)` on any other IO error.
    /// The timeout applies per call; callers reconfigure it freely between
    /// calls.
    pub async fn recv<M: DeserializeOwned>(
        &mut self,
        timeout: Duration,
    ) -> Result<Option<M>, FusionError> {
        let deadline = tokio::time::Instant::now() + timeout;

        let mut header = [0u8; 12];
        match tokio::time::timeout_at(deadline, self.stream.read_exact(&mut header)).await {
            Err(_) => return Ok(None),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }

        let len = u32::from_be_bytes([header[8], header[9], header[10], header[11]]) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(FusionError::protocol(format!(
                "message too large: {} bytes",
                len
            )));
        }

        let mut body = vec![0u8; len];
        match tokio::time::timeout_at(deadline, self.stream.read_exact(&mut body)).await {
            Err(_) => return Ok(None),
            Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Ok(Err(e)) => return Err(e.into()),
            Ok(Ok(_)) => {}
        }

        bincode::deserialize(&body)
            .map(Some)
            .map_err(|e| FusionError::protocol(format!("undecodable message: {}", e)))
    }
}
