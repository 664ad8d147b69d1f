//! Target-side end of the hot reload channel.
//!
//! The companion agent loaded into the target process dials the channel,
//! reads one update request at a time and answers each with a single
//! acknowledgment byte.

use deltawatch_core::{ApplyResult, HotReloadError, HotReloadResult, UpdatePayload};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

use crate::channel::{connect, ChannelName, ClientStream};

const READ_CHUNK: usize = 8 * 1024;

/// Client used by the companion agent inside the target process
#[derive(Debug)]
pub struct AgentClient {
    stream: ClientStream,
    buffer: Vec<u8>,
}

impl AgentClient {
    /// Dial the watcher's channel
    pub async fn connect(name: &ChannelName) -> HotReloadResult<Self> {
        let stream = connect(name)
            .await
            .map_err(|e| HotReloadError::channel(format!("Failed to connect to {}: {}", name, e)))?;
        info!(channel = %name, "Connected to hot reload channel");
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: ClientStream) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
        }
    }

    /// Read the next update request.
    ///
    /// Requests carry no length prefix; the end of the JSON object marks the
    /// end of the request. Returns `None` once the watcher closes the channel.
    pub async fn next_payload(&mut self) -> HotReloadResult<Option<UpdatePayload>> {
        loop {
            if let Some(payload) = self.parse_buffered()? {
                return Ok(Some(payload));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                return Err(HotReloadError::channel("Channel closed in the middle of a request"));
            }
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    fn parse_buffered(&mut self) -> HotReloadResult<Option<UpdatePayload>> {
        let (parsed, consumed) = {
            let mut stream =
                serde_json::Deserializer::from_slice(&self.buffer).into_iter::<UpdatePayload>();
            match stream.next() {
                Some(Ok(payload)) => (Some(payload), stream.byte_offset()),
                Some(Err(e)) if e.is_eof() => (None, 0),
                Some(Err(e)) => return Err(e.into()),
                // Only whitespace buffered
                None => (None, self.buffer.len()),
            }
        };

        self.buffer.drain(..consumed);
        Ok(parsed)
    }

    /// Answer the last request
    pub async fn respond(&mut self, result: ApplyResult) -> HotReloadResult<()> {
        self.acknowledge(result.as_byte()).await
    }

    /// Write a raw acknowledgment byte
    pub async fn acknowledge(&mut self, byte: u8) -> HotReloadResult<()> {
        self.stream.write_u8(byte).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Answer every request with `handler` until the watcher disconnects.
    ///
    /// Returns the number of requests served.
    pub async fn serve<F>(mut self, mut handler: F) -> HotReloadResult<usize>
    where
        F: FnMut(&UpdatePayload) -> ApplyResult,
    {
        let mut served = 0;
        while let Some(payload) = self.next_payload().await? {
            let result = handler(&payload);
            debug!(
                changed_file = %payload.changed_file,
                deltas = payload.deltas.len(),
                %result,
                "Handled update"
            );
            self.respond(result).await?;
            served += 1;
        }
        info!(served, "Hot reload channel closed");
        Ok(served)
    }
}
