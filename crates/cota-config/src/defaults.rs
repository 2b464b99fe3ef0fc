//! Default values shared by the engine and the operator shell.

/// TCP port the transmitter's message manager listens on.
pub const DEFAULT_DEVICE_PORT: u16 = 50_000;

/// Deadline for establishing the device connection.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Deadline for a request to become writable and be sent.
pub const DEFAULT_SEND_TIMEOUT_MS: u64 = 5_000;

/// Deadline for a complete JSON response to arrive.
pub const DEFAULT_RECEIVE_TIMEOUT_MS: u64 = 5_000;

/// Capacity of the bounded command queue.
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 50;

/// Capacity of the result queue.
pub const DEFAULT_RESULT_QUEUE_CAPACITY: usize = 50;

/// Interval at which result consumers poll the result queue.
pub const DEFAULT_RESULT_POLL_INTERVAL_MS: u64 = 50;

/// Bounded wait the dispatcher applies to each dequeue.
pub const DEFAULT_DEQUEUE_WAIT_MS: u64 = 5_000;

/// Per-host connection timeout used by the subnet scanner.
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 2_000;

/// Cycle interval of the auto-assignment worker.
pub const DEFAULT_AUTO_ASSIGN_INTERVAL_MS: u64 = 2_000;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Json
}
