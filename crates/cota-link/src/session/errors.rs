//! Errors raised by the transmitter session.

use std::io;

use thiserror::Error;

use crate::catalog::BindError;

/// Failures surfaced while connecting to or exchanging with a transmitter.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The hostname could not be resolved.
    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    /// No resolved address accepted the connection.
    #[error("failed to connect to {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// The dialect probe did not produce a reply.
    #[error("version probe failed: {reason}")]
    Probe { reason: String },

    /// Neither the supplied values nor the template defaults fit the template.
    #[error(
        "malformed request for {command}: template expects {expected} values, {supplied} supplied"
    )]
    MalformedRequest {
        command: String,
        expected: usize,
        supplied: usize,
    },

    /// A supplied value does not fit the template; nothing was sent.
    #[error("invalid request for {command}: {source}")]
    InvalidRequest {
        command: String,
        #[source]
        source: BindError,
    },

    /// Writing the request failed for a reason other than the deadline.
    #[error("Socket Send Error - {source}")]
    Write {
        #[source]
        source: io::Error,
    },

    /// Reading the reply failed for a reason other than the deadline.
    #[error("Socket Receive Error - {source}")]
    Read {
        #[source]
        source: io::Error,
    },

    /// The transmitter closed the connection mid-exchange.
    #[error("connection closed by transmitter")]
    Closed,
}

impl SessionError {
    /// Creates a probe error.
    pub fn probe(reason: impl Into<String>) -> Self {
        Self::Probe {
            reason: reason.into(),
        }
    }

    /// Creates a malformed request error.
    pub fn malformed(command: impl Into<String>, expected: usize, supplied: usize) -> Self {
        Self::MalformedRequest {
            command: command.into(),
            expected,
            supplied,
        }
    }

    /// Returns true when the error leaves the session disconnected.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Write { .. } | Self::Read { .. } | Self::Closed | Self::Probe { .. }
        )
    }
}
