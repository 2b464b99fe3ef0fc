//! Structured health reporting for engine lifecycle events.

use std::sync::Arc;

use cota_config::Config;

use crate::bootstrap::BootstrapError;
use crate::catalog::Dialect;

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap completes successfully.
    fn bootstrap_succeeded(&self, config: &Config);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked when the dispatcher thread begins consuming commands.
    fn dispatcher_started(&self);

    /// Invoked after the dispatcher thread has closed the command queue.
    fn dispatcher_stopped(&self);

    /// Invoked after a transmitter session is established.
    fn session_connected(&self, host: &str, dialect: Dialect);

    /// Invoked when a transmitter session ends.
    fn session_disconnected(&self, host: &str);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        (**self).bootstrap_succeeded(config);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn dispatcher_started(&self) {
        (**self).dispatcher_started();
    }

    fn dispatcher_stopped(&self) {
        (**self).dispatcher_stopped();
    }

    fn session_connected(&self, host: &str, dialect: Dialect) {
        (**self).session_connected(host, dialect);
    }

    fn session_disconnected(&self, host: &str) {
        (**self).session_disconnected(host);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting engine bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            device_port = config.device_port(),
            log_filter = %config.log_filter(),
            log_format = ?config.log_format(),
            "engine bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "engine bootstrap failed"
        );
    }

    fn dispatcher_started(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "dispatcher_started",
            "dispatcher accepting commands"
        );
    }

    fn dispatcher_stopped(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "dispatcher_stopped",
            "dispatcher stopped"
        );
    }

    fn session_connected(&self, host: &str, dialect: Dialect) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "session_connected",
            host,
            dialect = %dialect,
            "transmitter session established"
        );
    }

    fn session_disconnected(&self, host: &str) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "session_disconnected",
            host,
            "transmitter session ended"
        );
    }
}
