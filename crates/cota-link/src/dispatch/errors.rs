//! Error types for command dispatch.

use thiserror::Error;

use crate::discovery::DiscoveryError;
use crate::remote::RemoteError;
use crate::session::SessionError;

/// Errors returned by command handlers.
///
/// The dispatcher renders these into [`super::ResultData::Error`]; they never
/// stop the worker.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A required positional argument was absent.
    #[error("missing argument: {name}")]
    MissingArgument { name: String },

    /// An argument could not be interpreted.
    #[error("invalid argument {name}: {value}")]
    InvalidArgument { name: String, value: String },

    /// The request was well formed but rejected before reaching the device.
    #[error("{message}")]
    Rejected { message: String },

    /// The transmitter produced no usable reply.
    #[error("{command} failed: {status}")]
    Device { command: String, status: String },

    /// Session-level failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Remote shell failure.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Subnet scan failure.
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl HandlerError {
    /// Creates a missing argument error.
    pub fn missing_argument(name: impl Into<String>) -> Self {
        Self::MissingArgument { name: name.into() }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Creates a device error.
    pub fn device(command: impl Into<String>, status: impl Into<String>) -> Self {
        Self::Device {
            command: command.into(),
            status: status.into(),
        }
    }
}

/// Errors raised by the command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The dispatcher has shut down and no longer accepts commands.
    #[error("command queue closed")]
    Closed,
    /// A thread panicked while holding the queue lock.
    #[error("command queue lock poisoned")]
    Poisoned,
}

/// Errors raised while running or stopping the dispatcher thread.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// The worker thread panicked outside a handler.
    #[error("dispatcher thread panicked")]
    Panicked,
    /// The shutdown command could not be enqueued.
    #[error(transparent)]
    Queue(#[from] QueueError),
}
