//! Transmitter operations bound to the command registry.
//!
//! [`Transmitter`] owns the [`Session`] and everything the dispatcher needs
//! between commands: cached system information, configuration parameters, the
//! remote collaborators, and the [`LiveState`] shared with auto-assignment.
//! Each submodule groups one family of operations; all of them go through the
//! helpers here so that a dropped connection is noticed and reported once.

mod config;
mod logs;
mod lpm;
mod receivers;
mod system;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use cota_config::Config;

use crate::auto_assign::LiveState;
use crate::catalog::Dialect;
use crate::discovery::SubnetScanner;
use crate::dispatch::{Args, CommandKind, CommandTarget, HandlerError, handler_for};
use crate::health::HealthReporter;
use crate::remote::{RemoteConfig, RemoteLogManager, RemoteShell, UnavailableShell};
use crate::session::{
    Exchange, INVALID_COMMAND_STATUS, NOT_CONNECTED, Params, Session, SessionTimeouts,
    TIMEOUT_STATUS,
};

pub use config::ORION_CONFIG_PARAMS;
pub use receivers::{APP_COMMANDS, app_command_code, decode_app_data};
pub use system::{ORION_DEBUG_COMMANDS, SHARED_SYSTEM_COMMANDS, VENUS_DEBUG_COMMANDS};

const DEVICE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::device");

/// Status text the transmitter uses for an accepted request.
pub const SUCCESS: &str = "SUCCESS";
/// Reported when a reply carries no `Result.Status`.
pub const NO_STATUS: &str = "No Status";

const RETRY_PAUSE: Duration = Duration::from_millis(100);

/// Remote shells used for configuration and logger access.
pub struct Collaborators {
    /// Shell used to download and upload the configuration document.
    pub config_shell: Box<dyn RemoteShell>,
    /// Shell used to drive the on-device logger.
    pub log_shell: Box<dyn RemoteShell>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            config_shell: Box::new(UnavailableShell),
            log_shell: Box::new(UnavailableShell),
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// A transmitter as seen by the dispatcher.
pub struct Transmitter {
    session: Session,
    default_port: u16,
    scanner: SubnetScanner,
    live: LiveState,
    reporter: Arc<dyn HealthReporter>,
    connected_host: Option<String>,
    sysinfo: Map<String, Value>,
    firmware_loaded: bool,
    lpm_mode: bool,
    cfg_params: Map<String, Value>,
    remote_config: Option<RemoteConfig>,
    config_shell: Box<dyn RemoteShell>,
    logs: RemoteLogManager,
}

impl Transmitter {
    /// Creates a disconnected transmitter.
    #[must_use]
    pub fn new(
        config: &Config,
        live: LiveState,
        reporter: Arc<dyn HealthReporter>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            session: Session::new(SessionTimeouts::from_config(config)),
            default_port: config.device_port(),
            scanner: SubnetScanner::new(config.device_port(), config.scan_timeout()),
            live,
            reporter,
            connected_host: None,
            sysinfo: Map::new(),
            firmware_loaded: false,
            lpm_mode: false,
            cfg_params: Map::new(),
            remote_config: None,
            config_shell: collaborators.config_shell,
            logs: RemoteLogManager::new(collaborators.log_shell),
        }
    }

    /// Dialect of the connected transmitter.
    #[must_use]
    pub const fn dialect(&self) -> Option<Dialect> {
        self.session.dialect()
    }

    /// Whether the connected transmitter runs in low-power mode.
    #[must_use]
    pub const fn lpm_mode(&self) -> bool {
        self.lpm_mode
    }

    /// Configuration parameters read so far.
    #[must_use]
    pub const fn cfg_params(&self) -> &Map<String, Value> {
        &self.cfg_params
    }

    /// Opens a session with `host`, probing its dialect and LPM capability.
    ///
    /// Connection failures are logged and reported as `false`.
    pub fn connect(&mut self, host: &str, port: Option<u16>) -> Result<Value, HandlerError> {
        self.reset_connection_state();
        let port = port.unwrap_or(self.default_port);
        match self.session.connect(host, port) {
            Ok(dialect) => {
                self.connected_host = Some(host.to_owned());
                self.reporter.session_connected(host, dialect);
                self.lpm_mode = self.check_lpm_mode();
                debug!(target: DEVICE_TARGET, host, lpm = self.lpm_mode, "session ready");
                Ok(Value::Bool(self.session.is_connected()))
            }
            Err(error) => {
                warn!(target: DEVICE_TARGET, host, port, %error, "connect failed");
                Ok(Value::Bool(false))
            }
        }
    }

    /// Closes every connection.
    pub fn quit(&mut self) -> Result<Value, HandlerError> {
        self.logs.disconnect();
        self.session.disconnect();
        self.observe_disconnect();
        Ok(Value::from(SUCCESS))
    }

    /// Scans the local subnet for transmitters.
    pub fn search_for_tx(&mut self) -> Result<Value, HandlerError> {
        let hosts = self.scanner.scan_local_subnet()?;
        Ok(Value::Array(
            hosts
                .into_iter()
                .map(|host| Value::String(host.to_string()))
                .collect(),
        ))
    }

    fn reset_connection_state(&mut self) {
        self.logs.disconnect();
        self.session.disconnect();
        self.observe_disconnect();
        self.sysinfo.clear();
        self.firmware_loaded = false;
        self.lpm_mode = false;
        self.cfg_params.clear();
        self.remote_config = None;
    }

    fn connected_dialect(&self) -> Result<Dialect, HandlerError> {
        self.session
            .dialect()
            .ok_or_else(|| HandlerError::device("session", NOT_CONNECTED))
    }

    fn host(&self) -> Result<String, HandlerError> {
        self.session
            .hostname()
            .map(str::to_owned)
            .ok_or_else(|| HandlerError::device("session", NOT_CONNECTED))
    }

    /// Sends one request and notices if it cost us the connection.
    fn exchange(&mut self, command: &str, params: &Params) -> Exchange {
        let outcome = self.session.send_recv(command, params);
        self.observe_disconnect();
        outcome
    }

    fn exchange_within(&mut self, command: &str, params: &Params, timeout: Duration) -> Exchange {
        let outcome = self.session.send_recv_within(command, params, timeout);
        self.observe_disconnect();
        outcome
    }

    fn observe_disconnect(&mut self) {
        if self.session.is_connected() {
            return;
        }
        if let Some(host) = self.connected_host.take() {
            self.reporter.session_disconnected(&host);
            self.live.clear();
        }
    }

    /// Sends one request and requires a reply.
    fn request(&mut self, command: &str, params: &Params) -> Result<Value, HandlerError> {
        let outcome = self.exchange(command, params);
        expect_reply(command, outcome)
    }

    /// Sends one request and returns its `Result.Status`.
    fn request_status(&mut self, command: &str, params: &Params) -> Result<Value, HandlerError> {
        self.request(command, params).map(|reply| status_of(&reply))
    }

    /// Repeats a request until the device reports success or `window`
    /// elapses, returning the last status seen.
    fn retry_until_success(
        &mut self,
        command: &str,
        params: &Params,
        window: Duration,
    ) -> Result<Value, HandlerError> {
        let deadline = Instant::now() + window;
        let mut status = String::new();
        let mut attempts = 0_u32;
        loop {
            attempts = attempts.saturating_add(1);
            match self.exchange(command, params) {
                Exchange::Reply(reply) => {
                    status = result_field(&reply, "Status")
                        .map(text_of)
                        .unwrap_or_default();
                }
                Exchange::Timeout => {}
                other => return Err(unanswered(command, other)),
            }
            if status == SUCCESS || Instant::now() >= deadline {
                break;
            }
            thread::sleep(RETRY_PAUSE);
        }
        debug!(target: DEVICE_TARGET, command, attempts, status, "retry finished");
        Ok(Value::String(status))
    }
}

impl CommandTarget for Transmitter {
    fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    fn execute(&mut self, kind: CommandKind, args: Args<'_>) -> Result<Value, HandlerError> {
        handler_for(kind)(self, args)
    }
}

impl std::fmt::Debug for Transmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transmitter")
            .field("session", &self.session)
            .field("lpm_mode", &self.lpm_mode)
            .field("logs", &self.logs)
            .finish_non_exhaustive()
    }
}

/// Converts an exchange into its reply, or the error describing why none
/// arrived.
fn expect_reply(command: &str, outcome: Exchange) -> Result<Value, HandlerError> {
    match outcome {
        Exchange::Reply(reply) => Ok(reply),
        other => Err(unanswered(command, other)),
    }
}

fn unanswered(command: &str, outcome: Exchange) -> HandlerError {
    match outcome {
        Exchange::Failed(error) => HandlerError::Session(error),
        Exchange::NotConnected => HandlerError::device(command, NOT_CONNECTED),
        Exchange::InvalidCommand => HandlerError::device(command, INVALID_COMMAND_STATUS),
        Exchange::Timeout => HandlerError::device(command, TIMEOUT_STATUS),
        Exchange::Reply(reply) => HandlerError::device(command, reply.to_string()),
    }
}

fn result_of(reply: &Value) -> Option<&Map<String, Value>> {
    reply.get("Result")?.as_object()
}

fn result_field<'a>(reply: &'a Value, key: &str) -> Option<&'a Value> {
    result_of(reply)?.get(key)
}

fn status_of(reply: &Value) -> Value {
    result_field(reply, "Status")
        .cloned()
        .unwrap_or_else(|| Value::from(NO_STATUS))
}

/// Renders a JSON value as plain text, without quotes for strings.
pub(crate) fn text_of(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Leading integer of texts such as `"3 READY"`.
fn leading_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.split_whitespace().next()?.parse().ok(),
        _ => None,
    }
}

/// Formats seconds since the epoch as a UTC `HH:MM:SS` wall-clock time.
fn clock_time(seconds: i64) -> Option<String> {
    let time = time::OffsetDateTime::from_unix_timestamp(seconds).ok()?.time();
    Some(format!(
        "{:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    ))
}

fn digits_only(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(json!("3 READY"), Some(3))]
    #[case(json!(7), Some(7))]
    #[case(json!("READY"), None)]
    #[case(json!(null), None)]
    fn leading_integers_are_extracted(#[case] value: Value, #[case] expected: Option<i64>) {
        assert_eq!(leading_int(&value), expected);
    }

    #[test]
    fn clock_time_uses_utc() {
        assert_eq!(clock_time(3_661).as_deref(), Some("01:01:01"));
        assert_eq!(clock_time(86_399).as_deref(), Some("23:59:59"));
    }

    #[test]
    fn missing_status_is_reported_as_such() {
        assert_eq!(status_of(&json!({"Result": {}})), json!(NO_STATUS));
        assert_eq!(
            status_of(&json!({"Result": {"Status": "BUSY"}})),
            json!("BUSY")
        );
    }

    #[rstest]
    #[case("24", true)]
    #[case("", false)]
    #[case("2a", false)]
    #[case("-3", false)]
    fn digit_checks(#[case] text: &str, #[case] expected: bool) {
        assert_eq!(digits_only(text), expected);
    }
}
