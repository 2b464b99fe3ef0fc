//! Low-power mode slots and receiver transitions.
//!
//! Slot assignment, slot removal and the low-power transitions are not
//! acknowledged reliably on the first attempt, so those requests repeat
//! until the transmitter reports success or their window closes.

use std::collections::BTreeMap;
use std::thread;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{DEVICE_TARGET, Transmitter, result_field, text_of};
use crate::auto_assign::NEXT_SLOT;
use crate::catalog::Dialect;
use crate::dispatch::HandlerError;
use crate::session::{Exchange, Params};

const ASSIGN_WINDOW: Duration = Duration::from_secs(10);
const FREE_WINDOW: Duration = Duration::from_secs(5);
const TRANSITION_WINDOW: Duration = Duration::from_secs(10);
const STANDBY_SETTLE: Duration = Duration::from_millis(500);

const ENTER_LPM_CODE: &str = "81";
const STANDBY_CODE: &str = "87";
const SCREEN_UPDATE_CODE: u8 = 86;

// Placeholder identifiers reported for slots with no receiver.
const EMPTY_LONG_IDS: [&str; 3] = ["   ", "0x000000", "--"];

fn is_empty_long_id(id: &str) -> bool {
    EMPTY_LONG_IDS.iter().any(|marker| id.contains(marker))
}

fn short_id(slot: &Map<String, Value>) -> Option<u32> {
    match slot.get("Short ID")? {
        Value::Number(number) => number.as_u64().and_then(|id| u32::try_from(id).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

impl Transmitter {
    /// Whether the transmitter runs in low-power mode.
    ///
    /// Orion transmitters always do; Venus transmitters do when they report
    /// at least one slot.
    pub(super) fn check_lpm_mode(&mut self) -> bool {
        match self.session.dialect() {
            Some(Dialect::Orion) => true,
            Some(Dialect::Venus) => match self.exchange("lpm_list", &Params::None) {
                Exchange::Reply(reply) => result_field(&reply, "Slots")
                    .and_then(Value::as_array)
                    .is_some_and(|slots| !slots.is_empty()),
                _ => false,
            },
            None => false,
        }
    }

    /// Occupied slots sorted by short identifier.
    ///
    /// The first slot entry is a placeholder and is skipped. Returns `null`
    /// when the reply carries no slot list. Assigned slots are published to
    /// auto-assignment.
    pub fn lpm_list(&mut self) -> Result<Value, HandlerError> {
        let reply = self.request("lpm_list", &Params::None)?;
        let Some(slots) = result_field(&reply, "Slots").and_then(Value::as_array) else {
            return Ok(Value::Null);
        };

        let mut entries: Vec<(u32, Map<String, Value>)> = Vec::new();
        for slot in slots.iter().skip(1) {
            let Some(mut slot) = slot.as_object().cloned() else {
                continue;
            };
            let Some(id) = short_id(&slot) else {
                debug!(target: DEVICE_TARGET, ?slot, "slot without a short id");
                continue;
            };
            slot.insert("Short ID".to_owned(), Value::from(id));
            entries.push((id, slot));
        }
        entries.sort_by_key(|(id, _)| *id);

        let assigned: BTreeMap<u32, String> = entries
            .iter()
            .filter_map(|(id, slot)| {
                let long_id = slot.get("Long ID").map(text_of)?;
                (!is_empty_long_id(&long_id)).then_some((*id, long_id))
            })
            .collect();
        self.live.set_assigned(assigned);

        Ok(Value::Array(
            entries
                .into_iter()
                .map(|(_, slot)| Value::Object(slot))
                .collect(),
        ))
    }

    /// Assigns a receiver to `slot`, or to the next free slot.
    pub fn lpm_assign(&mut self, id: &str, slot: Option<&str>) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([
            (dialect.receiver_id_key(), id.to_owned()),
            ("Slot", slot.unwrap_or(NEXT_SLOT).to_owned()),
        ]);
        self.retry_until_success("lpm_assign", &params, ASSIGN_WINDOW)
    }

    /// Frees a slot.
    pub fn lpm_free(&mut self, slot: &str) -> Result<Value, HandlerError> {
        self.retry_until_success("lpm_free", &Params::keyed([("Slot", slot)]), FREE_WINDOW)
    }

    /// Switches a receiver into low-power mode.
    pub fn rx_lpm(&mut self, id: &str) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([
            (dialect.receiver_id_key(), id.to_owned()),
            ("App Command", ENTER_LPM_CODE.to_owned()),
            ("Data", r#"["1"]"#.to_owned()),
        ]);
        self.warn_on_template_mismatch("rx_lpm", dialect, &params);
        self.retry_until_success("app_command", &params, TRANSITION_WINDOW)
    }

    /// Puts a low-power receiver on standby after a short settling pause.
    pub fn rx_lpm_standby(&mut self, id: &str) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([
            (dialect.receiver_id_key(), id.to_owned()),
            ("App Command", STANDBY_CODE.to_owned()),
            ("Data", "[]".to_owned()),
        ]);
        self.warn_on_template_mismatch("rx_lpm_standby", dialect, &params);
        thread::sleep(STANDBY_SETTLE);
        self.retry_until_success("app_command", &params, TRANSITION_WINDOW)
    }

    /// Sets the number of low-power slots.
    pub fn lpm_slots(&mut self, slots: &str) -> Result<Value, HandlerError> {
        self.request_status("lpm_slots", &Params::keyed([("Slots", slots)]))
    }

    /// Turns transmitter low-power mode on or off.
    pub fn lpm(&mut self, state: Option<&str>) -> Result<Value, HandlerError> {
        let state = state.unwrap_or("on");
        self.request_status("lpm", &Params::keyed([("State", state)]))
    }

    /// Sets a receiver's screen refresh period.
    pub fn rx_screen_update(&mut self, id: &str, period: u64) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let params = Params::keyed([
            (dialect.receiver_id_key(), id.to_owned()),
            ("Data", format!("[{SCREEN_UPDATE_CODE}, {period}]")),
        ]);
        self.warn_on_template_mismatch("rx_screen_update", dialect, &params);
        self.request_status("app_command", &params)
    }

    /// The session substitutes template defaults when the value count is
    /// wrong, which turns these transitions into a plain ping.
    fn warn_on_template_mismatch(&self, operation: &str, dialect: Dialect, params: &Params) {
        let Some(template) = dialect.catalog().lookup("app_command") else {
            return;
        };
        let supplied = match params {
            Params::Keyed(pairs) => pairs.len(),
            Params::None => 0,
            Params::Text(text) => text.split_whitespace().count(),
        };
        let expected = template.placeholder_count();
        if supplied != expected {
            warn!(
                target: DEVICE_TARGET,
                operation,
                dialect = %dialect,
                expected,
                supplied,
                "application command shape does not match this dialect"
            );
        }
    }
}
