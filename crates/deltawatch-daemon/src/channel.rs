//! Local single-client byte-stream channel between the watcher and the target.
//!
//! On Unix this is a domain socket in the user's runtime directory, readable
//! and writable by the current user only. On Windows it is a named pipe that
//! rejects remote clients.

use std::fmt;
use std::io;
use std::path::PathBuf;

use tracing::debug;

/// Name of the channel shared by the watcher and the companion agent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Platform address the name resolves to
    #[cfg(unix)]
    pub fn endpoint(&self) -> PathBuf {
        dirs::runtime_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(format!("{}.sock", self.0))
    }

    /// Platform address the name resolves to
    #[cfg(windows)]
    pub fn endpoint(&self) -> PathBuf {
        PathBuf::from(format!(r"\\.\pipe\{}", self.0))
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(unix)]
pub use self::unix::{connect, ChannelListener, ClientStream, ServerStream};

#[cfg(windows)]
pub use self::windows::{connect, ChannelListener, ClientStream, ServerStream};

#[cfg(unix)]
mod unix {
    use std::os::unix::fs::PermissionsExt;

    use tokio::net::{UnixListener, UnixStream};

    use super::*;

    pub type ServerStream = UnixStream;
    pub type ClientStream = UnixStream;

    /// Server side of the channel; accepts exactly one client
    #[derive(Debug)]
    pub struct ChannelListener {
        inner: UnixListener,
        path: PathBuf,
    }

    impl ChannelListener {
        pub async fn bind(name: &ChannelName) -> io::Result<Self> {
            let path = name.endpoint();
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                tokio::fs::remove_file(&path).await?;
            }

            let inner = UnixListener::bind(&path)?;
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await?;
            debug!(path = %path.display(), "Channel listening");

            Ok(Self { inner, path })
        }

        pub fn path(&self) -> &std::path::Path {
            &self.path
        }

        /// Wait for the single client, then stop listening
        pub async fn accept(self) -> io::Result<ServerStream> {
            let (stream, _addr) = self.inner.accept().await?;
            debug!(path = %self.path.display(), "Channel client connected");
            Ok(stream)
        }
    }

    /// Dial the channel from the target side
    pub async fn connect(name: &ChannelName) -> io::Result<ClientStream> {
        UnixStream::connect(name.endpoint()).await
    }
}

#[cfg(windows)]
mod windows {
    use tokio::net::windows::named_pipe::{
        ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions,
    };

    use super::*;

    pub type ServerStream = NamedPipeServer;
    pub type ClientStream = NamedPipeClient;

    /// Server side of the channel; accepts exactly one client
    #[derive(Debug)]
    pub struct ChannelListener {
        inner: NamedPipeServer,
        path: PathBuf,
    }

    impl ChannelListener {
        pub async fn bind(name: &ChannelName) -> io::Result<Self> {
            let path = name.endpoint();
            let inner = ServerOptions::new()
                .first_pipe_instance(true)
                .reject_remote_clients(true)
                .create(&path)?;
            debug!(path = %path.display(), "Channel listening");

            Ok(Self { inner, path })
        }

        pub fn path(&self) -> &std::path::Path {
            &self.path
        }

        /// Wait for the single client, then stop listening
        pub async fn accept(self) -> io::Result<ServerStream> {
            self.inner.connect().await?;
            debug!(path = %self.path.display(), "Channel client connected");
            Ok(self.inner)
        }
    }

    /// Dial the channel from the target side
    pub async fn connect(name: &ChannelName) -> io::Result<ClientStream> {
        ClientOptions::new().open(name.endpoint())
    }
}
