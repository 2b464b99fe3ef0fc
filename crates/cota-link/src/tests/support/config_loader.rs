//! Test configuration loaders for scenarios covering success and failure paths.

use std::ffi::OsString;
use std::sync::Arc;

use ortho_config::{OrthoConfig as _, OrthoError};

use cota_config::Config;

use crate::bootstrap::ConfigLoader;

/// Loader returning short timeouts so scenarios finish quickly.
#[derive(Debug, Default)]
pub struct TestConfigLoader;

impl TestConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            receive_timeout_ms: 300,
            dequeue_wait_ms: 20,
            result_poll_interval_ms: 2,
            auto_assign_interval_ms: 20,
            ..Config::default()
        })
    }
}

/// Loader that intentionally fails by passing invalid CLI arguments.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let args = vec![
            OsString::from("cota-link"),
            OsString::from("--device-port"),
            OsString::from("not-a-port"),
        ];
        Config::load_from_iter(args)
    }
}
