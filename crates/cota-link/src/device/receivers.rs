//! Receiver listing, detail, management and application commands.

use serde_json::{Map, Value};
use tracing::debug;

use super::{DEVICE_TARGET, Transmitter, clock_time, leading_int, result_field, result_of, text_of};
use crate::catalog::{Dialect, QUERY_TYPE_STANDARD, receiver_status_label};
use crate::dispatch::HandlerError;
use crate::session::Params;

/// Application commands understood by receivers, by display name.
pub const APP_COMMANDS: &[(&str, u8)] = &[
    ("Blink Receiver LED", 1),
    ("Control USB power", 47),
    ("CW Beacon", 29),
    ("Discharge Batt to %", 51),
    ("Firmware Version", 61),
    ("Force Watchdog", 52),
    ("Get Beacon Frequency", 10),
    ("Get COM Channel", 11),
    ("Harvest Power", 58),
    ("Ping Receiver", 0),
    ("Read Watchdog", 20),
    ("Reset Receiver", 3),
    ("Set Beacon Frequency", 82),
    ("Set COM Channel", 15),
    ("Sleep Receiver", 2),
];

/// Reported when an application command left no readable data.
pub const NO_DATA: &str = "NO DATA";

const IDENTIFY_DURATION: &str = "10";
const UNSET: i64 = 255;

const ORION_DETAIL_KEYS: &[(&str, &str)] = &[
    ("Avg Power", "Average Power (dBm)"),
    ("Battery Level", "BatteryLevel (%)"),
    ("Net Current", "Net Current (mA)"),
    ("Peak Power", "Peak Power (dBm)"),
    ("Comm RSSI", "Comm RSSI (dBm)"),
];

const VENUS_DETAIL_KEYS: &[(&str, &str)] = &[
    ("AveragePower", "AveragePower (dBm)"),
    ("BatteryLevel", "BatteryLevel (%)"),
    ("NetCurrent", "NetCurrent (mA)"),
    ("PeakPower", "PeakPower (dBm)"),
    ("ProxyRSSIValue", "ProxyRSSIValue (dBm)"),
    ("RSSIValue", "RSSIValue (dBm)"),
];

// Low-power receivers reuse some detail fields for different readings.
const LPM_DETAIL_KEYS: &[(&str, &str)] = &[
    ("Status", "Status"),
    ("TPSMissed", "TPSMissed"),
    ("BatteryLevel", "Cap Level (%)"),
    ("PeakPower", "Number of Slots"),
    ("NetCurrent", "Cap Voltage (mV)"),
    ("RSSIValue", "RSSIValue (dBm)"),
    ("ProxyRSSIValue", "ProxyRSSIValue (dBm)"),
    ("ProxyLinkQuality", "ProxyLinkQuality"),
    ("QueryFailedCount", "QueryFailedCount"),
];

fn renamed(table: &[(&str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
}

/// Code of the application command named `name`.
#[must_use]
pub fn app_command_code(name: &str) -> Option<u8> {
    APP_COMMANDS
        .iter()
        .find(|(label, _)| *label == name)
        .map(|(_, code)| *code)
}

impl Transmitter {
    /// Lists receivers sorted by identifier, each labelled with its status.
    ///
    /// The identifiers become the visible set used by auto-assignment.
    pub fn rx_list(&mut self) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let reply = self.request("rx_list", &Params::None)?;
        let id_key = dialect.receiver_id_key();
        let mut receivers: Vec<Map<String, Value>> = result_field(&reply, dialect.receiver_list_key())
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_object).cloned().collect())
            .unwrap_or_default();
        receivers.sort_by_key(|receiver| receiver.get(id_key).map(text_of).unwrap_or_default());

        for receiver in &mut receivers {
            let status = match dialect {
                Dialect::Orion => {
                    let state = receiver.get("State").and_then(leading_int).unwrap_or(0);
                    let quality = receiver
                        .get("Link Quality")
                        .cloned()
                        .unwrap_or_else(|| Value::from(0));
                    receiver.insert("LinkQuality".to_owned(), quality);
                    receiver_status_label(dialect, state)
                }
                Dialect::Venus => receiver
                    .get("Status")
                    .and_then(Value::as_i64)
                    .map_or("UNKNOWN", |code| receiver_status_label(dialect, code)),
            };
            receiver.insert("Status".to_owned(), Value::from(status));
        }

        let visible = receivers
            .iter()
            .filter_map(|receiver| receiver.get(id_key).map(text_of))
            .collect();
        self.live.set_visible(visible);
        Ok(Value::Array(receivers.into_iter().map(Value::Object).collect()))
    }

    /// Detailed readings for one receiver, with units added to key names.
    pub fn rx_detail(&mut self, id: &str) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([(dialect.receiver_id_key(), id)]);
        let reply = self.request("rx_detail", &params)?;
        let mut result = result_of(&reply).cloned().unwrap_or_default();
        if dialect == Dialect::Orion {
            result.remove("Status");
        }

        let mut details = Map::new();
        for (key, value) in result {
            match (dialect, key.as_str()) {
                (_, "Status") => {}
                (Dialect::Orion, "Status Flags") => {
                    if let Value::Object(flags) = value {
                        details.extend(flags);
                    }
                }
                (Dialect::Orion, "State") => {
                    let state = value
                        .as_str()
                        .and_then(|text| text.split(' ').nth(1))
                        .map_or(value.clone(), Value::from);
                    details.insert(key, state);
                }
                _ => {
                    let value = unset_as_negative(detail_value(dialect, &key, value));
                    let table = match dialect {
                        Dialect::Orion => ORION_DETAIL_KEYS,
                        Dialect::Venus => VENUS_DETAIL_KEYS,
                    };
                    let key = renamed(table, &key).map_or(key, str::to_owned);
                    details.insert(key, value);
                }
            }
        }
        Ok(Value::Object(details))
    }

    /// Low-power readings for one receiver.
    pub fn lpm_detail(&mut self, id: &str) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([(dialect.receiver_id_key(), id)]);
        let reply = self.request("client_detail", &params)?;
        let mut details = Map::new();
        for (key, value) in result_of(&reply).into_iter().flatten() {
            let Some(label) = renamed(LPM_DETAIL_KEYS, key) else {
                continue;
            };
            let value = if key == "Status" {
                value
                    .as_i64()
                    .map_or_else(|| value.clone(), |code| Value::from(receiver_status_label(dialect, code)))
            } else {
                value.clone()
            };
            details.insert(label.to_owned(), value);
        }
        Ok(Value::Object(details))
    }

    fn receiver_status(
        &mut self,
        command: &str,
        id: &str,
        extra: Option<(&'static str, String)>,
    ) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let mut pairs = vec![(dialect.receiver_id_key(), id.to_owned())];
        pairs.extend(extra);
        self.request_status(command, &Params::Keyed(pairs))
    }

    /// Registers a receiver with a standard query type.
    pub fn register_rx(&mut self, id: &str) -> Result<Value, HandlerError> {
        let query = ("QueryType", QUERY_TYPE_STANDARD.to_string());
        self.receiver_status("register_rx", id, Some(query))
    }

    /// Unregisters a receiver.
    pub fn remove_rx(&mut self, id: &str) -> Result<Value, HandlerError> {
        self.receiver_status("remove_rx", id, None)
    }

    /// Asks a receiver to leave the network.
    pub fn rx_leave(&mut self, id: &str) -> Result<Value, HandlerError> {
        self.receiver_status("rx_leave", id, None)
    }

    pub fn rx_sleep(&mut self, id: &str) -> Result<Value, HandlerError> {
        self.receiver_status("rx_sleep", id, None)
    }

    pub fn start_charging(&mut self, id: &str) -> Result<Value, HandlerError> {
        self.receiver_status("start_charging", id, None)
    }

    pub fn stop_charging(&mut self, id: &str) -> Result<Value, HandlerError> {
        self.receiver_status("stop_charging", id, None)
    }

    /// Blinks a receiver for ten seconds.
    pub fn identify_rx(&mut self, id: &str) -> Result<Value, HandlerError> {
        let duration = ("Duration", IDENTIFY_DURATION.to_owned());
        self.receiver_status("identify_rx", id, Some(duration))
    }

    /// Changes a receiver's query type.
    pub fn rx_config(&mut self, id: &str, query_type: &str) -> Result<Value, HandlerError> {
        let query = ("QueryType", query_type.to_owned());
        self.receiver_status("rx_config", id, Some(query))
    }

    /// Sends a named application command to a receiver.
    ///
    /// Unknown names produce `null` without contacting the device.
    pub fn app_command(
        &mut self,
        id: &str,
        name: &str,
        data: Option<&str>,
    ) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let Some(code) = app_command_code(name) else {
            debug!(target: DEVICE_TARGET, name, "unknown application command");
            return Ok(Value::Null);
        };
        let data = data.filter(|data| !data.is_empty());
        let params = match dialect {
            Dialect::Orion => Params::keyed([
                ("RX ID", id.to_owned()),
                ("App Command", code.to_string()),
                ("Data", data.unwrap_or("[]").to_owned()),
            ]),
            Dialect::Venus => {
                let mut payload = vec![i64::from(code)];
                if let Some(data) = data {
                    let argument = data
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| HandlerError::invalid_argument("data", data))?;
                    payload.push(argument);
                }
                let rendered = payload
                    .iter()
                    .map(i64::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                Params::keyed([("Client ID", id.to_owned()), ("Data", format!("[{rendered}]"))])
            }
        };
        self.request_status("app_command", &params)
    }

    /// Reads back the data left by the last application command.
    pub fn app_command_data(&mut self, id: &str, name: &str) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([(dialect.receiver_id_key(), id)]);
        let reply = self.request("app_command_data", &params)?;
        Ok(decode_app_data(dialect, &reply, name))
    }
}

fn detail_value(dialect: Dialect, key: &str, value: Value) -> Value {
    match key {
        "QueryTime" => value
            .as_i64()
            .and_then(clock_time)
            .map_or(value, Value::from),
        "Model" if dialect == Dialect::Venus => value
            .as_u64()
            .map_or(value, |model| Value::from(format!("{model:X}"))),
        "DeviceStatus" => value.as_u64().map_or(value, |status| {
            let label = if status & 1 == 0 {
                "POWER_NOT_REQ"
            } else {
                "POWER_REQ"
            };
            Value::from(label)
        }),
        "Custom App Data" => value
            .as_str()
            .and_then(|text| serde_json::from_str::<Vec<String>>(text).ok())
            .map_or(value, |parts| Value::from(parts.concat())),
        _ => value,
    }
}

fn unset_as_negative(value: Value) -> Value {
    if value.as_i64() == Some(UNSET) {
        Value::from(-1)
    } else {
        value
    }
}

/// Interprets the data returned for application command `name`.
///
/// Anything that cannot be read yields `"NO DATA"`.
#[must_use]
pub fn decode_app_data(dialect: Dialect, reply: &Value, name: &str) -> Value {
    let decoded = match dialect {
        Dialect::Orion => decode_orion(reply, name),
        Dialect::Venus => decode_venus(reply, name),
    };
    decoded.unwrap_or_else(|| Value::from(NO_DATA))
}

fn decode_orion(reply: &Value, name: &str) -> Option<Value> {
    let data = result_field(reply, "Values")?
        .as_array()?
        .get(1)?
        .get("Data")?
        .as_str()?;
    let tokens: Vec<&str> = data.split_whitespace().collect();
    let byte = |index: usize| tokens.get(index).and_then(|token| parse_hex(token));
    match name {
        "Get COM Channel" => {
            // Newer firmware prefixes a length byte, which is always below
            // the first valid channel.
            let first = byte(0)?;
            let channel = if first < 11 { byte(3)? } else { first };
            Some(Value::from(channel))
        }
        "Firmware Version" => {
            let digits: String = tokens
                .iter()
                .take(4)
                .rev()
                .map(|token| token.replace("0x", ""))
                .collect();
            Some(Value::from(format!("0x{digits}")))
        }
        "Read Watchdog" => {
            let (first, second) = (tokens.get(5)?, tokens.get(6)?);
            Some(Value::from(format!("{first}, {second}")))
        }
        "Set Beacon Frequency" => {
            let frequency = (byte(1)? << 8) + byte(0)?;
            Some(Value::from(frequency.to_string()))
        }
        "Get Beacon Frequency" => {
            let raw = (0..4).rev().try_fold(0_u64, |acc, index| {
                byte(index).map(|value| (acc << 8) | value)
            })?;
            round_half_even(raw, 1_000_000).map(Value::from)
        }
        _ => Some(Value::from(
            tokens.iter().take(8).copied().collect::<Vec<_>>().join(" "),
        )),
    }
}

fn decode_venus(reply: &Value, name: &str) -> Option<Value> {
    let data: Vec<u64> = result_field(reply, "Data")?
        .as_array()?
        .iter()
        .map(Value::as_u64)
        .collect::<Option<_>>()?;
    match name {
        "Get COM Channel" => data.get(1).copied().map(Value::from),
        "Firmware Version" => {
            let digits: String = data
                .iter()
                .skip(1)
                .rev()
                .map(|byte| format!("{byte:02x}"))
                .collect();
            Some(Value::from(format!("0x{digits}")))
        }
        "Read Watchdog" => {
            let (first, second) = (data.get(6)?, data.get(7)?);
            Some(Value::from(format!("{first}, {second}")))
        }
        _ => Some(Value::from(
            data.iter()
                .skip(1)
                .take(7)
                .map(|byte| format!("{byte:#x}"))
                .collect::<Vec<_>>()
                .join(" "),
        )),
    }
}

fn parse_hex(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u64::from_str_radix(digits, 16).ok()
}

/// Divides, rounding halves to the even neighbour.
fn round_half_even(value: u64, divisor: u64) -> Option<u64> {
    let quotient = value.checked_div(divisor)?;
    let remainder = value.checked_rem(divisor)?;
    let doubled = remainder.checked_mul(2)?;
    let round_up = doubled > divisor || (doubled == divisor && quotient & 1 == 1);
    Some(if round_up { quotient + 1 } else { quotient })
}
