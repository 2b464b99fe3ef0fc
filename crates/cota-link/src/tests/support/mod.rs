//! Test harness utilities shared by unit and behavioural suites.

mod config_loader;
mod fake_device;
mod reporter;
mod world;

pub use fake_device::{FakeDevice, Reply, command_type};
pub use reporter::{HealthEvent, RecordingHealthReporter};
pub use world::{TestWorld, world};
