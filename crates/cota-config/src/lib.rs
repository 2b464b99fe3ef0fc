//! Shared configuration for the Cota link engine and its operator shell.
//!
//! Values are layered by [`ortho_config`]: built-in defaults, then an optional
//! configuration file, then `COTA_*` environment variables, then command-line
//! flags. Timeouts are stored as milliseconds so every layer can express them
//! as plain integers; the accessors hand out [`Duration`]s.

mod defaults;
mod logging;

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_AUTO_ASSIGN_INTERVAL_MS, DEFAULT_COMMAND_QUEUE_CAPACITY, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_DEQUEUE_WAIT_MS, DEFAULT_DEVICE_PORT, DEFAULT_LOG_FILTER, DEFAULT_RECEIVE_TIMEOUT_MS,
    DEFAULT_RESULT_POLL_INTERVAL_MS, DEFAULT_RESULT_QUEUE_CAPACITY, DEFAULT_SCAN_TIMEOUT_MS,
    DEFAULT_SEND_TIMEOUT_MS, default_log_filter, default_log_filter_string, default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "COTA")]
pub struct Config {
    /// Port probed by the scanner and used when `CONNECT` names no port.
    #[ortho_config(default = DEFAULT_DEVICE_PORT)]
    pub device_port: u16,
    /// Connection establishment deadline in milliseconds.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Request transmission deadline in milliseconds.
    #[ortho_config(default = DEFAULT_SEND_TIMEOUT_MS)]
    pub send_timeout_ms: u64,
    /// Response collection deadline in milliseconds.
    #[ortho_config(default = DEFAULT_RECEIVE_TIMEOUT_MS)]
    pub receive_timeout_ms: u64,
    /// Bounded command queue capacity.
    #[ortho_config(default = DEFAULT_COMMAND_QUEUE_CAPACITY)]
    pub command_queue_capacity: usize,
    /// Result queue capacity.
    #[ortho_config(default = DEFAULT_RESULT_QUEUE_CAPACITY)]
    pub result_queue_capacity: usize,
    /// Result polling interval in milliseconds.
    #[ortho_config(default = DEFAULT_RESULT_POLL_INTERVAL_MS)]
    pub result_poll_interval_ms: u64,
    /// Dispatcher dequeue wait in milliseconds.
    #[ortho_config(default = DEFAULT_DEQUEUE_WAIT_MS)]
    pub dequeue_wait_ms: u64,
    /// Per-host discovery timeout in milliseconds.
    #[ortho_config(default = DEFAULT_SCAN_TIMEOUT_MS)]
    pub scan_timeout_ms: u64,
    /// Auto-assignment cycle interval in milliseconds.
    #[ortho_config(default = DEFAULT_AUTO_ASSIGN_INTERVAL_MS)]
    pub auto_assign_interval_ms: u64,
    /// `tracing` filter expression.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_port: DEFAULT_DEVICE_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
            receive_timeout_ms: DEFAULT_RECEIVE_TIMEOUT_MS,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            result_queue_capacity: DEFAULT_RESULT_QUEUE_CAPACITY,
            result_poll_interval_ms: DEFAULT_RESULT_POLL_INTERVAL_MS,
            dequeue_wait_ms: DEFAULT_DEQUEUE_WAIT_MS,
            scan_timeout_ms: DEFAULT_SCAN_TIMEOUT_MS,
            auto_assign_interval_ms: DEFAULT_AUTO_ASSIGN_INTERVAL_MS,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Port used when a host is given without one.
    #[must_use]
    pub fn device_port(&self) -> u16 {
        self.device_port
    }

    /// Connection establishment deadline.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Request transmission deadline.
    #[must_use]
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Response collection deadline.
    #[must_use]
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Command queue capacity, never below one.
    #[must_use]
    pub fn command_queue_capacity(&self) -> usize {
        self.command_queue_capacity.max(1)
    }

    /// Result queue capacity, never below one.
    #[must_use]
    pub fn result_queue_capacity(&self) -> usize {
        self.result_queue_capacity.max(1)
    }

    /// Result polling interval.
    #[must_use]
    pub fn result_poll_interval(&self) -> Duration {
        Duration::from_millis(self.result_poll_interval_ms)
    }

    /// Dispatcher dequeue wait.
    #[must_use]
    pub fn dequeue_wait(&self) -> Duration {
        Duration::from_millis(self.dequeue_wait_ms)
    }

    /// Per-host discovery timeout.
    #[must_use]
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    /// Auto-assignment cycle interval.
    #[must_use]
    pub fn auto_assign_interval(&self) -> Duration {
        Duration::from_millis(self.auto_assign_interval_ms)
    }

    /// Filter expression handed to the tracing subscriber.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format handed to the tracing subscriber.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_device_protocol() {
        let config = Config::default();
        assert_eq!(config.device_port(), 50_000);
        assert_eq!(config.send_timeout(), Duration::from_secs(5));
        assert_eq!(config.receive_timeout(), Duration::from_secs(5));
        assert_eq!(config.scan_timeout(), Duration::from_secs(2));
        assert_eq!(config.result_poll_interval(), Duration::from_millis(50));
        assert_eq!(config.command_queue_capacity(), 50);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let config = Config {
            command_queue_capacity: 0,
            ..Config::default()
        };
        assert_eq!(config.command_queue_capacity(), 1);
    }
}
