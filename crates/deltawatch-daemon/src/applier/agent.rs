//! Delta applier for targets running the in-process companion agent.
//!
//! The watcher owns the server side of a local channel. At initialization it
//! starts waiting for the agent to dial in, without blocking the caller. Each
//! apply is one half-duplex exchange: the JSON request goes out, exactly one
//! acknowledgment byte comes back within the ack timeout.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deltawatch_core::{
    ApplyResult, BrowserRefresh, ChangedFile, DeltaApplier, HotReloadError, HotReloadResult,
    ModuleUpdateBatch, UpdatePayload, WatchSession,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{notify_applied, send_diagnostics};
use crate::channel::{ChannelListener, ChannelName, ServerStream};

/// Why an exchange with the agent did not produce an acknowledgment
#[derive(Debug, thiserror::Error)]
enum ExchangeError {
    #[error("cancelled while sending the update")]
    Cancelled,

    #[error("no acknowledgment within {0:?}")]
    Timeout(Duration),

    #[error("agent sent more than one acknowledgment byte")]
    TrailingBytes,

    #[error("agent disconnected")]
    Disconnected,

    #[error("channel fault: {0}")]
    Fault(#[from] io::Error),
}

/// State of the server side of the channel for the current run iteration
#[derive(Debug, Default)]
enum Connection {
    #[default]
    Idle,
    /// Waiting in the background for the agent to connect
    Pending(JoinHandle<io::Result<ServerStream>>),
    Connected(ServerStream),
    /// The connection wait failed or the exchange state became unusable
    Closed,
}

impl Connection {
    /// Resolve a finished connection wait and return the stream if usable.
    ///
    /// Never waits for a client that has not connected yet.
    async fn ready(&mut self) -> Option<&mut ServerStream> {
        let finished = matches!(self, Connection::Pending(handle) if handle.is_finished());
        if finished {
            if let Connection::Pending(handle) = std::mem::replace(self, Connection::Closed) {
                match handle.await {
                    Ok(Ok(stream)) => {
                        info!("Hot reload agent connected");
                        *self = Connection::Connected(stream);
                    }
                    Ok(Err(e)) => warn!("Waiting for the hot reload agent failed: {}", e),
                    Err(e) => warn!("Connection wait task ended abnormally: {}", e),
                }
            }
        }

        match self {
            Connection::Connected(stream) => Some(stream),
            _ => None,
        }
    }

    /// Abort any pending wait and close the stream
    async fn shutdown(&mut self) {
        match std::mem::take(self) {
            Connection::Pending(handle) => {
                handle.abort();
                // Awaiting guarantees the old listener is dropped before rebinding.
                let _ = handle.await;
            }
            Connection::Connected(mut stream) => {
                let _ = stream.shutdown().await;
            }
            Connection::Idle | Connection::Closed => {}
        }
    }
}

/// Applies deltas through the in-process agent over a local channel
pub struct AgentDeltaApplier {
    channel_name: ChannelName,
    ack_timeout: Duration,
    browser: Option<Arc<dyn BrowserRefresh>>,
    connection: Mutex<Connection>,
}

impl AgentDeltaApplier {
    pub fn new(
        channel_name: ChannelName,
        ack_timeout: Duration,
        browser: Option<Arc<dyn BrowserRefresh>>,
    ) -> Self {
        Self {
            channel_name,
            ack_timeout,
            browser,
            connection: Mutex::new(Connection::Idle),
        }
    }

    pub fn channel_name(&self) -> &ChannelName {
        &self.channel_name
    }

    /// Whether the agent has connected and the channel is still usable
    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.ready().await.is_some()
    }

    /// Fail if the agent hung up or left unread bytes behind since the last exchange
    fn ensure_idle(stream: &ServerStream) -> Result<(), ExchangeError> {
        let mut pending = [0u8; 1];
        match stream.try_read(&mut pending) {
            Ok(0) => Err(ExchangeError::Disconnected),
            Ok(_) => Err(ExchangeError::TrailingBytes),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exchange(
        stream: &mut ServerStream,
        request: &[u8],
        ack_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<u8, ExchangeError> {
        Self::ensure_idle(stream)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExchangeError::Cancelled),
            written = async {
                stream.write_all(request).await?;
                stream.flush().await
            } => written?,
        }

        // The ack wait is bounded by its own timeout, not the caller's token.
        let ack = timeout(ack_timeout, stream.read_u8())
            .await
            .map_err(|_| ExchangeError::Timeout(ack_timeout))??;

        let mut extra = [0u8; 1];
        match stream.try_read(&mut extra) {
            Ok(n) if n > 0 => return Err(ExchangeError::TrailingBytes),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(e.into()),
        }

        Ok(ack)
    }
}

#[async_trait]
impl DeltaApplier for AgentDeltaApplier {
    async fn initialize(
        &self,
        session: &mut WatchSession,
        cancel: &CancellationToken,
    ) -> HotReloadResult<()> {
        if session.is_first_iteration() {
            match session.config().agent_path.clone() {
                Some(agent) => {
                    session.register_agent_hook(&agent);
                }
                None => debug!("No hot reload agent configured; the target must load one itself"),
            }
        }

        let mut connection = self.connection.lock().await;
        connection.shutdown().await;

        let listener = ChannelListener::bind(&self.channel_name).await.map_err(|e| {
            HotReloadError::channel(format!(
                "Failed to create channel {}: {}",
                self.channel_name, e
            ))
        })?;

        let cancel = cancel.clone();
        let wait = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(io::Error::new(
                    io::ErrorKind::Interrupted,
                    "connection wait cancelled",
                )),
                accepted = listener.accept() => accepted,
            }
        });
        *connection = Connection::Pending(wait);

        info!(
            channel = %self.channel_name,
            iteration = session.iteration(),
            "Waiting for hot reload agent to connect"
        );
        Ok(())
    }

    async fn apply(
        &self,
        _session: &WatchSession,
        changed_file: &ChangedFile,
        updates: &ModuleUpdateBatch,
        cancel: &CancellationToken,
    ) -> bool {
        let mut connection = self.connection.lock().await;
        let Some(stream) = connection.ready().await else {
            debug!("Hot reload agent not connected; skipping update for {}", changed_file);
            return false;
        };

        let request = match UpdatePayload::new(changed_file, updates).to_bytes() {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to serialize update for {}: {}", changed_file, e);
                return false;
            }
        };

        let outcome = Self::exchange(stream, &request, self.ack_timeout, cancel).await;
        let ack = match outcome {
            Ok(ack) => Some(ack),
            Err(ExchangeError::Disconnected) => {
                debug!("Hot reload agent disconnected; skipping update for {}", changed_file);
                *connection = Connection::Closed;
                None
            }
            Err(e) => {
                warn!("Hot reload update for {} failed: {}", changed_file, e);
                // A late or partial reply would be misread by the next exchange.
                *connection = Connection::Closed;
                None
            }
        };
        drop(connection);

        let result = ApplyResult::from_ack(ack);
        debug!(deltas = updates.len(), %result, "Hot reload agent replied for {}", changed_file);
        if !result.is_success() {
            return false;
        }

        notify_applied(self.browser.as_deref(), result, cancel).await;
        true
    }

    async fn report_diagnostics(
        &self,
        _session: &WatchSession,
        diagnostics: &[String],
        cancel: &CancellationToken,
    ) {
        send_diagnostics(self.browser.as_deref(), diagnostics, cancel).await;
    }
}
