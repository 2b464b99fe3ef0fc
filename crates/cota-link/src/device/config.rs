//! Transmitter configuration: NVM parameters on Orion, the remote
//! configuration document on Venus.

use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;

use super::{DEVICE_TARGET, SUCCESS, Transmitter, result_field, text_of};
use crate::catalog::Dialect;
use crate::dispatch::HandlerError;
use crate::remote::RemoteConfig;
use crate::session::Params;

/// NVM parameters read by `GET_ALL_CONFIG` on Orion transmitters.
pub const ORION_CONFIG_PARAMS: &[&str] = &[
    "COMM_CHANNEL",
    "POWER_LEVEL",
    "VALID_AMB_MASK",
    "TX_FREQUENCY",
    "LPM_SLOTS",
    "CHARGER_ID",
    "FAN_MODE",
    "RSSI_FILTER",
];

impl Transmitter {
    /// Reads the full configuration.
    ///
    /// Orion parameters are read one by one into the parameter cache; Venus
    /// downloads the configuration document, which is kept for later edits.
    pub fn all_config(&mut self) -> Result<Value, HandlerError> {
        match self.connected_dialect()? {
            Dialect::Orion => {
                self.cfg_params.clear();
                for param in ORION_CONFIG_PARAMS {
                    self.cfg_param(param)?;
                }
                Ok(Value::Object(self.cfg_params.clone()))
            }
            Dialect::Venus => {
                let host = self.host()?;
                let config = RemoteConfig::download(self.config_shell.as_mut(), &host)?;
                let values = config.values();
                self.remote_config = Some(config);
                Ok(Value::Object(values))
            }
        }
    }

    /// Writes the edited configuration back.
    ///
    /// Orion stores parameters as they are set, so there is nothing to do.
    pub fn save_all_config(&mut self) -> Result<Value, HandlerError> {
        match self.connected_dialect()? {
            Dialect::Orion => Ok(Value::from(SUCCESS)),
            Dialect::Venus => {
                let host = self.host()?;
                let config = self.remote_config.as_ref().ok_or_else(|| {
                    HandlerError::rejected("no configuration downloaded; run GET_ALL_CONFIG first")
                })?;
                config.upload(self.config_shell.as_mut(), &host, OffsetDateTime::now_utc())?;
                info!(target: DEVICE_TARGET, host, "configuration saved");
                Ok(Value::from(SUCCESS))
            }
        }
    }

    /// Reads one NVM parameter into the cache.
    pub fn cfg_param(&mut self, param: &str) -> Result<Value, HandlerError> {
        let reply = self.request("get_cfg_param", &Params::keyed([("Param", param)]))?;
        match result_field(&reply, "Value") {
            Some(value) => {
                self.cfg_params.insert(param.to_owned(), value.clone());
                Ok(Value::from(SUCCESS))
            }
            None => Ok(Value::from("ERROR")),
        }
    }

    /// Writes one NVM parameter.
    pub fn set_cfg_param(&mut self, param: &str, value: &str) -> Result<Value, HandlerError> {
        let params = Params::keyed([("Param", param), ("Value", value)]);
        self.request_status("set_cfg_param", &params)
    }

    /// Changes one configuration value and returns the updated values.
    ///
    /// On Venus this edits the downloaded document in memory; nothing reaches
    /// the transmitter until `SAVE_ALL_CONFIG`. On Orion the parameter is
    /// written and read back.
    pub fn update_config_value(&mut self, name: &str, value: &str) -> Result<Value, HandlerError> {
        match self.connected_dialect()? {
            Dialect::Orion => {
                let status = self.set_cfg_param(name, value)?;
                if text_of(&status) != SUCCESS {
                    return Err(HandlerError::device("set_cfg_param", text_of(&status)));
                }
                self.cfg_param(name)?;
                Ok(Value::Object(self.cfg_params.clone()))
            }
            Dialect::Venus => {
                let config = self.remote_config.as_mut().ok_or_else(|| {
                    HandlerError::rejected("no configuration downloaded; run GET_ALL_CONFIG first")
                })?;
                config.update_value(name, value)?;
                Ok(Value::Object(config.values()))
            }
        }
    }
}
