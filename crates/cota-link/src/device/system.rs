//! Transmitter-wide status, settings and system commands.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{
    DEVICE_TARGET, SUCCESS, Transmitter, digits_only, leading_int, result_field, result_of,
    status_of, text_of,
};
use crate::catalog::{Dialect, system_state_label};
use crate::dispatch::HandlerError;
use crate::session::{Exchange, Params};

const ERROR_VALUE: &str = "Error";
const CALIBRATION_TIMEOUT: Duration = Duration::from_secs(30);
const ORION_AMB_KEYS: [&str; 4] = ["AMB0", "AMB1", "AMB2", "AMB3"];

/// System commands available on every transmitter.
pub const SHARED_SYSTEM_COMMANDS: &[(&str, &str)] = &[
    ("Calibrate", "calibrate"),
    ("Identify Transmitter", "identify_tx"),
    ("Shutdown", "shutdown"),
];

/// Debug commands offered by Orion transmitters.
pub const ORION_DEBUG_COMMANDS: &[(&str, &str)] = &[
    ("Charge Virtual", "charge_virtual"),
    ("Fans Full", "set_fans_full"),
    ("Pause", "pause"),
    ("Reboot All", "reboot"),
    ("Reset Array", "reset_array"),
    ("Reset NVM", "reset_nvm"),
    ("Reset Proxy", "reset_proxy"),
    ("Restart Host MCU", "reset_host"),
    ("RSSI Filter Enable", "set_rssi_filter_en"),
    ("Run", "run"),
    ("Sample Beacon", "sample_beacon"),
    ("Send Discovery", "send_disc"),
    ("Set TX Frequency", "set_tx_freq"),
    ("Shutdown", "shutdown"),
    ("Static Charge", "static_charge"),
    ("Static Power", "static_power"),
];

/// Debug commands offered by Venus transmitters.
pub const VENUS_DEBUG_COMMANDS: &[(&str, &str)] = &[
    ("Add Client", "add_client"),
    ("Pause", "pause"),
    ("Reboot CCB", "reboot"),
    ("Reset Array", "reset_array"),
    ("Reset FPGA", "reset_fpga"),
    ("Reset Proxy", "reset_proxy"),
    ("Restart Daemon", "restart"),
    ("Run", "run"),
    ("Send Discovery", "send_disc"),
    ("Shutdown", "shutdown"),
];

/// Command whose reply is usually lost because the device restarts.
const REBOOT_ALL: &str = "Reboot All";

fn lookup(table: &[(&str, &'static str)], name: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(label, _)| *label == name)
        .map(|(_, command)| *command)
}

impl Transmitter {
    /// Refreshes and returns the system information map.
    ///
    /// Firmware versions are fetched once per connection.
    pub fn system_info(&mut self) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;

        let comm = self.query_field("get_comm_channel", "COM Channel");
        self.sysinfo.insert("COMM Channel".to_owned(), comm);
        let frequency = self.tx_frequency();
        self.sysinfo
            .insert("Power Frequency (MHz)".to_owned(), frequency);
        let temperature = self.system_temperature(dialect);
        self.sysinfo
            .insert("Temperature (C)".to_owned(), temperature);
        let ambs_key = match dialect {
            Dialect::Orion => "Valid Ambs",
            Dialect::Venus => "Good Channels",
        };
        let ambs = self.query_field("get_valid_ambs", ambs_key);
        self.sysinfo.insert("Valid AMBs".to_owned(), ambs);
        let power = self.query_field("get_power_level", "PowerLevel");
        self.sysinfo.insert("Power Level (dBm)".to_owned(), power);
        let state = self.system_state(dialect);
        self.sysinfo
            .insert("State".to_owned(), Value::from(state));

        if !self.firmware_loaded {
            self.load_firmware(dialect)?;
        }
        Ok(Value::Object(self.sysinfo.clone()))
    }

    fn query_field(&mut self, command: &str, key: &str) -> Value {
        match self.exchange(command, &Params::None) {
            Exchange::Reply(reply) => result_field(&reply, key)
                .cloned()
                .unwrap_or_else(|| Value::from(ERROR_VALUE)),
            _ => Value::from(ERROR_VALUE),
        }
    }

    fn tx_frequency(&mut self) -> Value {
        let frequency = self.query_field("get_tx_freq", "Tx Freq");
        if text_of(&frequency) != "0" {
            return frequency;
        }
        let comm = self
            .sysinfo
            .get("COMM Channel")
            .map_or_else(|| "0".to_owned(), text_of);
        let derived = match comm.as_str() {
            "24" => "2460",
            "25" => "2450",
            "26" => "2440",
            _ => ERROR_VALUE,
        };
        Value::from(derived)
    }

    fn system_temperature(&mut self, dialect: Dialect) -> Value {
        let reply = match self.exchange("get_system_temp", &Params::None) {
            Exchange::Reply(reply) => reply,
            _ => return Value::from(ERROR_VALUE),
        };
        match dialect {
            Dialect::Orion => {
                let readings: Option<Vec<String>> = ORION_AMB_KEYS
                    .iter()
                    .map(|key| {
                        let reading = result_field(&reply, key)?.as_str()?;
                        reading.split_whitespace().next().map(str::to_owned)
                    })
                    .collect();
                readings.map_or_else(|| Value::from(ERROR_VALUE), |r| Value::from(r.join(", ")))
            }
            Dialect::Venus => result_field(&reply, "Temp")
                .cloned()
                .unwrap_or_else(|| Value::from(ERROR_VALUE)),
        }
    }

    fn system_state(&mut self, dialect: Dialect) -> &'static str {
        match dialect {
            Dialect::Orion => {
                let state = self.query_field("get_system_state", "System State");
                system_state_label(dialect, leading_int(&state).unwrap_or(0))
            }
            Dialect::Venus => {
                let state = self.query_field("get_system_state", "State");
                state
                    .as_i64()
                    .map_or("UNKNOWN", |code| system_state_label(dialect, code))
            }
        }
    }

    fn load_firmware(&mut self, dialect: Dialect) -> Result<(), HandlerError> {
        let reply = self.request("versions", &Params::None)?;
        let Some(versions) = result_of(&reply) else {
            debug!(target: DEVICE_TARGET, "versions reply carried no result");
            return Ok(());
        };
        let entries = match dialect {
            Dialect::Orion => orion_firmware(versions),
            Dialect::Venus => venus_firmware(versions),
        };
        self.sysinfo.extend(entries);
        self.firmware_loaded = true;
        Ok(())
    }

    /// Runs a named system or debug command.
    ///
    /// Calibration waits up to 30 seconds for its reply, and shutdown closes
    /// the session. A missing reply counts as success only for a full reboot.
    pub fn system_command(&mut self, name: &str, data: Option<&str>) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let outcome = if let Some(command) = lookup(SHARED_SYSTEM_COMMANDS, name) {
            match name {
                "Calibrate" => self.exchange_within(command, &Params::None, CALIBRATION_TIMEOUT),
                "Shutdown" => {
                    let outcome = self.exchange(command, &Params::None);
                    info!(target: DEVICE_TARGET, "transmitter shutting down");
                    self.session.disconnect();
                    self.observe_disconnect();
                    outcome
                }
                _ => self.exchange(command, &Params::None),
            }
        } else {
            let table = match dialect {
                Dialect::Orion => ORION_DEBUG_COMMANDS,
                Dialect::Venus => VENUS_DEBUG_COMMANDS,
            };
            let command = lookup(table, name)
                .ok_or_else(|| HandlerError::rejected(format!("unknown system command: {name}")))?;
            let params = match (dialect, data) {
                (_, None) => Params::None,
                (Dialect::Orion, Some(data)) => Params::text(data),
                (Dialect::Venus, Some(data)) => Params::keyed([("Data", data)]),
            };
            self.exchange(command, &params)
        };

        let status = match outcome {
            Exchange::Reply(reply) => status_of(&reply),
            _ if name == REBOOT_ALL => Value::from(SUCCESS),
            _ => Value::from("ERROR"),
        };
        Ok(status)
    }

    /// Sets the transmitter's communication channel (13 to 26).
    pub fn set_comm_channel(&mut self, channel: &str) -> Result<Value, HandlerError> {
        let valid = digits_only(channel)
            && channel
                .parse::<u8>()
                .is_ok_and(|value| (13..=26).contains(&value));
        if !valid {
            return Err(HandlerError::rejected(format!(
                "COMM channel must be 13 to 26, got {channel:?}"
            )));
        }
        let params = Params::keyed([("Channel", channel), ("RX ID", "0")]);
        self.request_status("set_comm_channel", &params)
    }

    /// Sets the valid AMB mask, given as hexadecimal text.
    pub fn set_valid_ambs(&mut self, mask: &str) -> Result<Value, HandlerError> {
        if !mask.contains("0x") {
            return Err(HandlerError::rejected(format!(
                "AMB mask must be hexadecimal, got {mask:?}"
            )));
        }
        self.request_status("set_valid_ambs", &Params::keyed([("Mask", mask)]))
    }

    /// Sets the transmit power level.
    pub fn set_power_level(&mut self, level: &str) -> Result<Value, HandlerError> {
        if !digits_only(level) {
            return Err(HandlerError::rejected(format!(
                "power level must be numeric, got {level:?}"
            )));
        }
        self.request_status("set_power_level", &Params::keyed([("Power Level", level)]))
    }

    /// Sends a discovery beacon on `channel` (2 to 26).
    pub fn send_discovery(&mut self, channel: &str) -> Result<Value, HandlerError> {
        let valid = digits_only(channel)
            && channel
                .parse::<u8>()
                .is_ok_and(|value| (2..=26).contains(&value));
        if !valid {
            return Err(HandlerError::rejected(format!(
                "discovery channel must be 2 to 26, got {channel:?}"
            )));
        }
        self.request_status("send_disc", &Params::keyed([("Channel", channel)]))
    }

    /// Charger identifier, or `Unknown`.
    pub fn tx_id(&mut self) -> Result<Value, HandlerError> {
        let reply = self.request("get_tx_id", &Params::None)?;
        Ok(result_field(&reply, "ChargerId")
            .cloned()
            .unwrap_or_else(|| Value::from("Unknown")))
    }

    /// Raw AMB information.
    pub fn amb_info(&mut self) -> Result<Value, HandlerError> {
        let reply = self.request("get_amb_info", &Params::None)?;
        Ok(result_of(&reply).map_or_else(|| Value::Array(Vec::new()), |r| Value::Object(r.clone())))
    }

    /// Starts virtual charging.
    pub fn charge_virtual(&mut self) -> Result<Value, HandlerError> {
        self.request_status("charge_virtual", &Params::None)
    }

    /// Restarts the host MCU.
    pub fn reset_host(&mut self) -> Result<Value, HandlerError> {
        self.request_status("reset_host", &Params::keyed([("Hold", "0.5"), ("Block", "1.0")]))
    }

    /// The newest `entries` MCU log lines.
    pub fn mcu_log(&mut self, entries: u64) -> Result<Value, HandlerError> {
        let params = Params::keyed([("Entries", entries.to_string()), ("File", "mcu".to_owned())]);
        let reply = self.request("get_mcu_log", &params)?;
        let lines = result_field(&reply, "Entries")
            .and_then(Value::as_array)
            .filter(|lines| !lines.is_empty())
            .cloned()
            .unwrap_or_else(|| vec![Value::from("No log entries")]);
        Ok(Value::Array(lines))
    }
}

/// Copies Orion version fields, splitting the OS description into parts.
fn orion_firmware(versions: &Map<String, Value>) -> Map<String, Value> {
    let mut entries = Map::new();
    for (key, value) in versions {
        if key == "OS Version" {
            for (part, label) in [
                ("OS name", "OS Type"),
                ("Host name", "Hostname"),
                ("Kernel ver", "Kernel"),
            ] {
                let text = value.get(part).cloned().unwrap_or(Value::Null);
                entries.insert(label.to_owned(), text);
            }
        } else {
            entries.insert(key.clone(), value.clone());
        }
    }
    entries
}

/// Renders Venus version integers as dotted bytes.
fn venus_firmware(versions: &Map<String, Value>) -> Map<String, Value> {
    let mut entries = Map::new();
    for (key, width) in [
        ("Release Version", 4),
        ("FPGA Revision", 2),
        ("Proxy FW Revision", 2),
    ] {
        let rendered = versions
            .get(key)
            .and_then(Value::as_u64)
            .map_or_else(|| ERROR_VALUE.to_owned(), |raw| dotted_bytes(raw, width));
        entries.insert(key.to_owned(), Value::from(rendered));
    }
    entries
}

/// The low `width` bytes of `value`, most significant first, joined by dots.
fn dotted_bytes(value: u64, width: u32) -> String {
    (0..width)
        .rev()
        .map(|index| ((value >> (index * 8)) & 0xFF).to_string())
        .collect::<Vec<_>>()
        .join(".")
}
