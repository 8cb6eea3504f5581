//! Single-instance guard over a Unix socket.
//!
//! The first process binds the socket and keeps running. Later launches
//! connect, send `activate` and exit.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

const SOCKET_NAME: &str = "osdwatchd.sock";
const ACTIVATE: &str = "activate";

#[derive(Error, Debug)]
pub enum InstanceError {
    #[error("XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,

    #[error("Failed to bind {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to reach running instance: {0}")]
    Notify(std::io::Error),

    #[error("Failed to accept activation: {0}")]
    Accept(std::io::Error),
}

/// Outcome of [`acquire`].
#[derive(Debug)]
pub enum Activation {
    /// This process owns the socket.
    Primary(InstanceGuard),
    /// Another instance is running and has been activated.
    Remote,
}

/// Default socket location under the user runtime directory.
pub fn default_socket_path() -> Result<PathBuf, InstanceError> {
    dirs::runtime_dir()
        .map(|dir| dir.join(SOCKET_NAME))
        .ok_or(InstanceError::NoRuntimeDir)
}

/// Become the primary instance, or activate the one already running.
pub async fn acquire(path: &Path) -> Result<Activation, InstanceError> {
    match UnixStream::connect(path).await {
        Ok(mut stream) => {
            debug!("Instance already running at {}", path.display());
            stream
                .write_all(format!("{ACTIVATE}\n").as_bytes())
                .await
                .map_err(InstanceError::Notify)?;
            stream.shutdown().await.map_err(InstanceError::Notify)?;
            return Ok(Activation::Remote);
        }
        Err(e) if path.exists() => {
            warn!("Removing stale socket {}: {}", path.display(), e);
            if let Err(e) = std::fs::remove_file(path) {
                return Err(InstanceError::Bind {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        }
        Err(_) => {}
    }

    let listener = UnixListener::bind(path).map_err(|e| InstanceError::Bind {
        path: path.to_path_buf(),
        source: e,
    })?;
    info!("Listening for activations on {}", path.display());

    Ok(Activation::Primary(InstanceGuard {
        path: path.to_path_buf(),
        listener,
    }))
}

/// Bound instance socket; removed on drop.
#[derive(Debug)]
pub struct InstanceGuard {
    path: PathBuf,
    listener: UnixListener,
}

impl InstanceGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Wait for the next launch and return the command it sent.
    pub async fn next_activation(&self) -> Result<String, InstanceError> {
        let (stream, _) = self.listener.accept().await.map_err(InstanceError::Accept)?;

        let mut line = String::new();
        BufReader::new(stream)
            .read_line(&mut line)
            .await
            .map_err(InstanceError::Accept)?;

        let command = line.trim().to_string();
        debug!("Activation received: {:?}", command);
        Ok(command)
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            debug!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}
