//! BDD test world: loader, reporter, engine and fake transmitter shared by steps.

use std::cell::RefCell;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::bootstrap::{BootstrapError, ConfigLoader, bootstrap_with};
use crate::device::Collaborators;
use crate::dispatch::{CommandEnvelope, ResultEnvelope};
use crate::engine::Engine;

use super::config_loader::{FailingConfigLoader, TestConfigLoader};
use super::fake_device::FakeDevice;
use super::reporter::RecordingHealthReporter;

const RESULT_DEADLINE: Duration = Duration::from_secs(5);

/// Scenario world shared across BDD steps.
pub struct TestWorld {
    loader: Box<dyn ConfigLoader>,
    pub reporter: Arc<RecordingHealthReporter>,
    engine: Option<Engine>,
    bootstrap_error: Option<BootstrapError>,
    device: Option<FakeDevice>,
    results: Vec<ResultEnvelope>,
    shutdown_clean: Option<bool>,
}

impl TestWorld {
    /// Builds a world with a successful configuration loader.
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: Box::new(TestConfigLoader::new()),
            reporter: Arc::new(RecordingHealthReporter::default()),
            engine: None,
            bootstrap_error: None,
            device: None,
            results: Vec::new(),
            shutdown_clean: None,
        }
    }

    /// Installs a loader that always fails.
    pub fn use_failing_loader(&mut self) {
        self.loader = Box::new(FailingConfigLoader);
        self.reset_results();
    }

    /// Installs a loader that succeeds.
    pub fn use_successful_loader(&mut self) {
        self.loader = Box::new(TestConfigLoader::new());
        self.reset_results();
    }

    /// Runs the bootstrap sequence once.
    pub fn bootstrap(&mut self) {
        if self.engine.is_some() || self.bootstrap_error.is_some() {
            return;
        }
        match bootstrap_with(
            &*self.loader,
            self.reporter.clone(),
            Collaborators::default(),
        ) {
            Ok(engine) => self.engine = Some(engine),
            Err(error) => self.bootstrap_error = Some(error),
        }
    }

    /// Returns whether bootstrap produced an error.
    #[must_use]
    pub fn bootstrap_error(&self) -> Option<&BootstrapError> {
        self.bootstrap_error.as_ref()
    }

    /// Returns true when the engine is running.
    #[must_use]
    pub fn engine_started(&self) -> bool {
        self.engine.is_some()
    }

    /// Starts a fake transmitter speaking `dialect`.
    pub fn start_device(&mut self, dialect: &str) -> Result<(), String> {
        let device = match dialect {
            "Orion" => FakeDevice::orion(),
            "Venus" => FakeDevice::venus(),
            other => return Err(format!("unknown dialect {other}")),
        };
        self.device = Some(device);
        Ok(())
    }

    /// Port of the fake transmitter.
    pub fn device_port(&self) -> Result<u16, String> {
        self.device
            .as_ref()
            .map(FakeDevice::port)
            .ok_or_else(|| "no fake transmitter started".to_owned())
    }

    /// Request types the fake transmitter has received.
    #[must_use]
    pub fn device_requests(&self) -> Vec<String> {
        self.device
            .as_ref()
            .map(FakeDevice::request_types)
            .unwrap_or_default()
    }

    /// Enqueues a command and records its result.
    pub fn submit(&mut self, tag: &str, args: Vec<Value>) -> Result<(), String> {
        let engine = self.engine.as_ref().ok_or("engine not started")?;
        let payload = (!args.is_empty()).then_some(args);
        engine
            .commands()
            .send(CommandEnvelope::from_tag(tag, payload))
            .map_err(|error| error.to_string())?;
        let result = engine
            .results()
            .next_within(RESULT_DEADLINE)
            .ok_or_else(|| format!("no result for {tag}"))?;
        self.results.push(result);
        Ok(())
    }

    /// Results recorded so far, oldest first.
    #[must_use]
    pub fn results(&self) -> &[ResultEnvelope] {
        &self.results
    }

    /// Stops the engine and records whether the dispatcher exited cleanly.
    pub fn shutdown(&mut self) {
        if let Some(engine) = self.engine.take() {
            self.shutdown_clean = Some(engine.shutdown().is_ok());
        }
    }

    /// Whether the engine shut down cleanly, once it has been stopped.
    #[must_use]
    pub const fn shutdown_clean(&self) -> Option<bool> {
        self.shutdown_clean
    }

    fn reset_results(&mut self) {
        self.engine = None;
        self.bootstrap_error = None;
        self.results.clear();
        self.shutdown_clean = None;
    }
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Default test world fixture.
#[must_use]
pub fn world() -> RefCell<TestWorld> {
    RefCell::new(TestWorld::new())
}
