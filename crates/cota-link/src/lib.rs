//! Command dispatch and transport engine for Cota wireless-power transmitters.
//!
//! Operators and automation submit tagged commands (`CONNECT`, `rx_list`,
//! `lpm_assign`, ...) to a bounded queue. A single dispatcher thread owns the
//! TCP session with the transmitter, runs each command through a static
//! registry of device operations, and publishes exactly one result per
//! command. The engine speaks both transmitter dialects, Orion and Venus,
//! which share the request framing but differ in command names, field keys
//! and status codes. The dialect is detected when the session opens.
//!
//! Two helpers run beside the dispatcher. The [`discovery`] scanner probes the
//! local /24 for listening transmitters, and the [`auto_assign`] worker walks a
//! whitelist of receivers, feeding slot assignments into the same queue until
//! every whitelisted receiver holds a low-power-mode slot.
//!
//! ## Lifecycle
//!
//! [`bootstrap_with`] loads the layered configuration from [`cota_config`],
//! installs the `tracing` subscriber and starts an [`Engine`]. Health hooks
//! report each stage so failures are visible in structured logs. The engine
//! stops when a `QUIT` command has been answered; a pending `QUIT` always
//! overtakes queued work.
//!
//! Configuration and logger access on the transmitter host go through the
//! [`remote::RemoteShell`] trait. No SSH transport ships with the crate, so
//! the default collaborators report the shell as unavailable.

pub mod auto_assign;
mod bootstrap;
pub mod catalog;
pub mod device;
pub mod discovery;
pub mod dispatch;
mod engine;
mod health;
pub mod remote;
pub mod session;
mod shell;
mod telemetry;

pub use bootstrap::{
    BootstrapError, ConfigLoader, StaticConfigLoader, SystemConfigLoader, bootstrap_with,
};
pub use engine::Engine;
pub use health::{HealthReporter, StructuredHealthReporter};
pub use shell::{AutoAssignAction, Shell, ShellError, ShellLine, parse_line};
pub use telemetry::{TelemetryError, TelemetryHandle};

#[cfg(test)]
mod tests;
