//! Test double for [`HealthReporter`] that records structured events for assertions.

use std::sync::Mutex;

use cota_config::Config;

use crate::bootstrap::BootstrapError;
use crate::catalog::Dialect;
use crate::health::HealthReporter;

/// Structured health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HealthEvent {
    /// Bootstrap started.
    BootstrapStarting,
    /// Bootstrap completed successfully.
    BootstrapSucceeded,
    /// Bootstrap failed with an error description.
    BootstrapFailed(String),
    /// The dispatcher began consuming commands.
    DispatcherStarted,
    /// The dispatcher exited.
    DispatcherStopped,
    /// A session was opened with the host.
    SessionConnected(String),
    /// The session with the host ended.
    SessionDisconnected(String),
}

/// Records health events for assertions.
#[derive(Debug, Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    pub fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config) {
        self.record(HealthEvent::BootstrapSucceeded);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn dispatcher_started(&self) {
        self.record(HealthEvent::DispatcherStarted);
    }

    fn dispatcher_stopped(&self) {
        self.record(HealthEvent::DispatcherStopped);
    }

    fn session_connected(&self, host: &str, _dialect: Dialect) {
        self.record(HealthEvent::SessionConnected(host.to_owned()));
    }

    fn session_disconnected(&self, host: &str) {
        self.record(HealthEvent::SessionDisconnected(host.to_owned()));
    }
}
