//! Remote shell access to the transmitter host.
//!
//! Configuration editing and logger control both run over a remote shell on
//! the transmitter. The transport itself is abstracted behind [`RemoteShell`]
//! so deployments can plug in an SSH client; the crate ships
//! [`UnavailableShell`], which reports every operation as unavailable.

mod config;
mod logs;

use camino::Utf8Path;
use thiserror::Error;

pub use config::{ConfigEntry, REMOTE_CONFIG_PATH, RemoteConfig, backup_suffix};
pub use logs::{LogProfile, RemoteLogManager};

pub(crate) const REMOTE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::remote");

/// Where and as whom to open a remote shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// Transmitter host.
    pub host: String,
    /// Shell port.
    pub port: u16,
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl RemoteTarget {
    /// Builds a target.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// The same target on a different port.
    #[must_use]
    pub fn with_port(&self, port: u16) -> Self {
        Self {
            port,
            ..self.clone()
        }
    }
}

/// Metadata for a file in a remote directory.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RemoteFile {
    /// File name without directory.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time as seconds since the Unix epoch.
    pub modified: u64,
}

/// Failures reported by a remote shell.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// No remote shell implementation is configured.
    #[error("remote shell unavailable")]
    Unavailable,
    /// The credentials were refused.
    #[error("authentication failed for {username}@{host}:{port}")]
    Authentication {
        host: String,
        port: u16,
        username: String,
    },
    /// The shell could not be reached.
    #[error("failed to reach {host}:{port}: {message}")]
    Connect {
        host: String,
        port: u16,
        message: String,
    },
    /// An operation was attempted before connecting.
    #[error("NOT CONNECTED")]
    NotConnected,
    /// The remote path does not exist.
    #[error("remote file not found: {path}")]
    NotFound { path: String },
    /// A transfer or command failed.
    #[error("{operation} failed: {message}")]
    Operation { operation: String, message: String },
    /// The remote configuration file could not be parsed or rendered.
    #[error("invalid configuration document: {message}")]
    Document { message: String },
    /// No configuration entry has the requested name.
    #[error("unknown configuration entry: {name}")]
    UnknownEntry { name: String },
    /// The value does not fit the entry's declared type.
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },
    /// Logging interval must be positive.
    #[error("log interval must be greater than zero")]
    InvalidInterval,
}

impl RemoteError {
    /// Creates an operation error.
    pub fn operation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Remote command execution and file transfer on the transmitter host.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteShell: Send {
    /// Opens a session.
    fn connect(&mut self, target: &RemoteTarget) -> Result<(), RemoteError>;

    /// Closes the session, if open.
    fn disconnect(&mut self);

    /// Runs `command` and returns its exit status.
    fn execute(&mut self, command: &str) -> Result<i32, RemoteError>;

    /// Reads a remote file.
    fn read_file(&mut self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Replaces a remote file's contents.
    fn write_file(&mut self, path: &str, contents: &[u8]) -> Result<(), RemoteError>;

    /// Lists a remote directory.
    fn list_dir(&mut self, path: &str) -> Result<Vec<RemoteFile>, RemoteError>;

    /// Copies a remote file to `local`, returning the bytes written.
    fn download(&mut self, remote: &str, local: &Utf8Path) -> Result<u64, RemoteError>;

    /// Deletes a remote file.
    fn remove(&mut self, path: &str) -> Result<(), RemoteError>;
}

/// Shell used when no remote transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableShell;

impl RemoteShell for UnavailableShell {
    fn connect(&mut self, _target: &RemoteTarget) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }

    fn disconnect(&mut self) {}

    fn execute(&mut self, _command: &str) -> Result<i32, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    fn read_file(&mut self, _path: &str) -> Result<Vec<u8>, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    fn write_file(&mut self, _path: &str, _contents: &[u8]) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }

    fn list_dir(&mut self, _path: &str) -> Result<Vec<RemoteFile>, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    fn download(&mut self, _remote: &str, _local: &Utf8Path) -> Result<u64, RemoteError> {
        Err(RemoteError::Unavailable)
    }

    fn remove(&mut self, _path: &str) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }
}
