//! TCP session with a single transmitter.
//!
//! A [`Session`] owns the socket, the detected [`Dialect`], and the deadlines
//! applied to each request. [`Session::send_recv`] is the only way requests
//! reach the device: it looks the command up in the dialect's catalog, binds
//! the caller's values into the template, writes the request as one JSON
//! document, and accumulates bytes until one JSON document has been received. Every call returns an
//! [`Exchange`] describing the outcome; nothing here panics or raises.

mod errors;
mod receive;

use std::io::{ErrorKind, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use cota_config::Config;

use crate::catalog::{CommandTemplate, Dialect};

pub use errors::SessionError;
pub(crate) use receive::DocumentAccumulator;
use receive::{ReceiveOutcome, discard_stale, is_transient, receive_document};

pub(crate) const SESSION_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::session");

/// Built-in dialect probe understood by every transmitter.
pub const PROBE_COMMAND: &str = "GetVersion";
const PROBE_REQUEST: &str = r#"{"Command":{"Type":"GetVersion"},"Result":{}}"#;

/// Status reported when a command is absent from the dialect catalog.
pub const INVALID_COMMAND_STATUS: &str = "INVALID CMD";
/// Status reported when a deadline expires.
pub const TIMEOUT_STATUS: &str = "TIMEOUT";
/// Value returned for requests issued while disconnected.
pub const NOT_CONNECTED: &str = "Not Connected";

/// Deadlines applied by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Bound on establishing the TCP connection.
    pub connect: Duration,
    /// Bound on writing one request.
    pub send: Duration,
    /// Bound on receiving one reply.
    pub receive: Duration,
}

impl SessionTimeouts {
    /// Reads the deadlines from the resolved configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            connect: config.connect_timeout(),
            send: config.send_timeout(),
            receive: config.receive_timeout(),
        }
    }
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Values bound into a command template.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Params {
    /// No values.
    #[default]
    None,
    /// Whitespace-separated values.
    Text(String),
    /// Named values, bound in the order given.
    Keyed(Vec<(&'static str, String)>),
}

impl Params {
    /// Builds whitespace-separated parameters.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Builds named parameters from `(name, value)` pairs.
    pub fn keyed<I, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<String>,
    {
        Self::Keyed(
            pairs
                .into_iter()
                .map(|(name, value)| (name, value.into()))
                .collect(),
        )
    }

    fn values(&self) -> Vec<&str> {
        match self {
            Self::None => Vec::new(),
            Self::Text(text) => text.split_whitespace().collect(),
            Self::Keyed(pairs) => pairs.iter().map(|(_, value)| value.as_str()).collect(),
        }
    }
}

/// Outcome of one request/reply exchange.
#[derive(Debug)]
pub enum Exchange {
    /// The session was not connected; nothing was sent.
    NotConnected,
    /// The command is not in the dialect catalog; nothing was sent.
    InvalidCommand,
    /// The write or receive deadline expired.
    Timeout,
    /// The exchange failed. Fatal errors leave the session disconnected.
    Failed(SessionError),
    /// A complete JSON reply.
    Reply(Value),
}

impl Exchange {
    /// The reply document, if one arrived.
    #[must_use]
    pub const fn reply(&self) -> Option<&Value> {
        match self {
            Self::Reply(value) => Some(value),
            _ => None,
        }
    }

    /// The reply's `Result` object, if present.
    #[must_use]
    pub fn result(&self) -> Option<&Map<String, Value>> {
        self.reply()?.get("Result")?.as_object()
    }

    /// A single field of the reply's `Result` object.
    #[must_use]
    pub fn result_field(&self, key: &str) -> Option<&Value> {
        self.result()?.get(key)
    }

    /// The reply's `Result.Status` text.
    #[must_use]
    pub fn result_status(&self) -> Option<&str> {
        self.result_field("Status")?.as_str()
    }

    /// Renders the outcome as the JSON value handed to callers.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::NotConnected => Value::String(NOT_CONNECTED.to_owned()),
            Self::InvalidCommand => json!({ "Status": INVALID_COMMAND_STATUS }),
            Self::Timeout => json!({ "Status": TIMEOUT_STATUS }),
            Self::Failed(error) => json!({ "Status": error.to_string() }),
            Self::Reply(value) => value,
        }
    }
}

/// Connection to one transmitter.
#[derive(Debug)]
pub struct Session {
    stream: Option<TcpStream>,
    dialect: Option<Dialect>,
    hostname: Option<String>,
    timeouts: SessionTimeouts,
    stale_reply: bool,
}

impl Session {
    /// Creates a disconnected session.
    #[must_use]
    pub const fn new(timeouts: SessionTimeouts) -> Self {
        Self {
            stream: None,
            dialect: None,
            hostname: None,
            timeouts,
            stale_reply: false,
        }
    }

    /// Returns true while a connection is open.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Dialect detected during the last successful connect.
    #[must_use]
    pub const fn dialect(&self) -> Option<Dialect> {
        self.dialect
    }

    /// Host of the current or most recent connection.
    #[must_use]
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// Opens a connection and probes the transmitter's dialect.
    ///
    /// Any existing connection is closed first. An unanswered probe selects
    /// Venus, as does any reply lacking a `Version` key. On failure the
    /// session is left disconnected.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<Dialect, SessionError> {
        self.disconnect();
        let stream = self.open(host, port)?;
        if let Err(error) = stream.set_nodelay(true) {
            debug!(target: SESSION_TARGET, %error, "failed to disable Nagle");
        }
        self.stream = Some(stream);
        self.hostname = Some(host.to_owned());

        let dialect = match self.exchange(PROBE_COMMAND, PROBE_REQUEST) {
            Exchange::Reply(reply) => detect_dialect(&reply),
            Exchange::Timeout => {
                warn!(target: SESSION_TARGET, host, "version probe unanswered; assuming Venus");
                Dialect::Venus
            }
            Exchange::Failed(error) => {
                self.disconnect();
                return Err(error);
            }
            Exchange::NotConnected | Exchange::InvalidCommand => {
                self.disconnect();
                return Err(SessionError::probe("connection lost during probe"));
            }
        };
        self.dialect = Some(dialect);
        info!(
            target: SESSION_TARGET,
            host,
            port,
            dialect = %dialect,
            "connected to transmitter"
        );
        Ok(dialect)
    }

    fn open(&self, host: &str, port: u16) -> Result<TcpStream, SessionError> {
        let addresses = (host, port)
            .to_socket_addrs()
            .map_err(|source| SessionError::Resolve {
                host: host.to_owned(),
                source,
            })?;
        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, self.timeouts.connect) {
                Ok(stream) => return Ok(stream),
                Err(error) => {
                    debug!(target: SESSION_TARGET, %address, %error, "connect attempt failed");
                    last_error = Some(error);
                }
            }
        }
        Err(SessionError::Connect {
            host: host.to_owned(),
            port,
            source: last_error
                .unwrap_or_else(|| std::io::Error::new(ErrorKind::NotFound, "no addresses")),
        })
    }

    /// Closes the connection, if any. Idempotent.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(target: SESSION_TARGET, %error, "socket shutdown failed");
            }
            info!(target: SESSION_TARGET, host = ?self.hostname, "disconnected");
        }
        self.dialect = None;
        self.stale_reply = false;
    }

    /// Sends `command` with `params` and waits for the reply.
    pub fn send_recv(&mut self, command: &str, params: &Params) -> Exchange {
        if !self.is_connected() {
            return Exchange::NotConnected;
        }
        if command == PROBE_COMMAND {
            return self.exchange(command, PROBE_REQUEST);
        }
        let Some(dialect) = self.dialect else {
            return Exchange::NotConnected;
        };
        let Some(template) = dialect.catalog().lookup(command) else {
            debug!(target: SESSION_TARGET, command, %dialect, "command not in catalog");
            return Exchange::InvalidCommand;
        };
        match bind(template, params) {
            Ok(request) => self.exchange(command, &request),
            Err(error) => Exchange::Failed(error),
        }
    }

    /// Like [`Self::send_recv`] but with a one-off receive deadline.
    pub fn send_recv_within(
        &mut self,
        command: &str,
        params: &Params,
        receive_timeout: Duration,
    ) -> Exchange {
        let saved = self.timeouts.receive;
        self.timeouts.receive = receive_timeout;
        let outcome = self.send_recv(command, params);
        self.timeouts.receive = saved;
        outcome
    }

    fn exchange(&mut self, command: &str, request: &str) -> Exchange {
        let Some(stream) = self.stream.as_mut() else {
            return Exchange::NotConnected;
        };
        debug!(target: SESSION_TARGET, command, request, "sending request");

        if self.stale_reply {
            match discard_stale(stream) {
                Ok(0) => {}
                Ok(discarded) => {
                    debug!(target: SESSION_TARGET, discarded, "discarded late reply bytes");
                }
                Err(source) => return self.fail(SessionError::Read { source }),
            }
            self.stale_reply = false;
        }

        if let Err(source) = stream.set_write_timeout(Some(self.timeouts.send)) {
            return self.fail(SessionError::Write { source });
        }
        match stream.write_all(request.as_bytes()) {
            Ok(()) => {}
            Err(error) if is_transient(&error) => {
                warn!(target: SESSION_TARGET, command, "send deadline expired");
                return Exchange::Timeout;
            }
            Err(source) => return self.fail(SessionError::Write { source }),
        }

        let deadline = Instant::now() + self.timeouts.receive;
        match receive_document(stream, deadline) {
            ReceiveOutcome::Document(reply) => {
                debug!(target: SESSION_TARGET, command, %reply, "received reply");
                Exchange::Reply(reply)
            }
            ReceiveOutcome::TimedOut { pending } => {
                warn!(target: SESSION_TARGET, command, pending, "receive deadline expired");
                self.stale_reply = true;
                Exchange::Timeout
            }
            ReceiveOutcome::Closed => self.fail(SessionError::Closed),
            ReceiveOutcome::Failed(source) => self.fail(SessionError::Read { source }),
        }
    }

    fn fail(&mut self, error: SessionError) -> Exchange {
        warn!(target: SESSION_TARGET, %error, "socket fault; dropping connection");
        self.disconnect();
        Exchange::Failed(error)
    }
}

fn bind(template: &CommandTemplate, params: &Params) -> Result<String, SessionError> {
    let values = params.values();
    let expected = template.placeholder_count();
    let document = if values.len() == expected {
        template.bind(&values)
    } else {
        warn!(
            target: SESSION_TARGET,
            command = template.name,
            expected,
            supplied = values.len(),
            "argument count mismatch; sending template defaults"
        );
        if template.defaults.len() != expected {
            return Err(SessionError::malformed(template.name, expected, values.len()));
        }
        template.bind_defaults()
    };
    document
        .map(|document| document.to_string())
        .map_err(|source| SessionError::InvalidRequest {
            command: template.name.to_owned(),
            source,
        })
}

fn detect_dialect(reply: &Value) -> Dialect {
    let has_version = reply
        .get("Result")
        .and_then(Value::as_object)
        .is_some_and(|result| result.contains_key("Version"));
    if has_version {
        Dialect::Orion
    } else {
        Dialect::Venus
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::tests::support::{FakeDevice, Reply, command_type};

    #[fixture]
    fn timeouts() -> SessionTimeouts {
        SessionTimeouts {
            connect: Duration::from_millis(500),
            send: Duration::from_millis(500),
            receive: Duration::from_millis(300),
        }
    }

    #[rstest]
    fn probe_detects_orion(timeouts: SessionTimeouts) {
        let device = FakeDevice::orion();
        let mut session = Session::new(timeouts);
        let dialect = session
            .connect("127.0.0.1", device.port())
            .expect("connect");
        assert_eq!(dialect, Dialect::Orion);
        assert!(session.is_connected());
        assert_eq!(device.request_types(), vec![PROBE_COMMAND]);
    }

    #[rstest]
    fn probe_without_version_selects_venus(timeouts: SessionTimeouts) {
        let device = FakeDevice::venus();
        let mut session = Session::new(timeouts);
        let dialect = session
            .connect("127.0.0.1", device.port())
            .expect("connect");
        assert_eq!(dialect, Dialect::Venus);
    }

    #[rstest]
    fn unanswered_probe_selects_venus(timeouts: SessionTimeouts) {
        let device = FakeDevice::start(|_| Reply::Silent);
        let mut session = Session::new(timeouts);
        let dialect = session
            .connect("127.0.0.1", device.port())
            .expect("connect");
        assert_eq!(dialect, Dialect::Venus);
        assert!(session.is_connected());
    }

    #[rstest]
    fn requests_while_disconnected_send_nothing(timeouts: SessionTimeouts) {
        let mut session = Session::new(timeouts);
        let outcome = session.send_recv("rx_list", &Params::None);
        assert!(matches!(outcome, Exchange::NotConnected));
        assert_eq!(outcome.into_value(), json!("Not Connected"));
    }

    #[rstest]
    fn unknown_commands_are_rejected_locally(timeouts: SessionTimeouts) {
        let device = FakeDevice::venus();
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv("charge_virtual", &Params::None);
        assert_eq!(outcome.into_value(), json!({"Status": "INVALID CMD"}));
        assert_eq!(device.request_types(), vec![PROBE_COMMAND]);
    }

    #[rstest]
    fn keyed_values_bind_positionally(timeouts: SessionTimeouts) {
        let device = FakeDevice::orion();
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv(
            "register_rx",
            &Params::keyed([("clientid", "0x1234"), ("querytype", "5")]),
        );
        assert_eq!(outcome.result_status(), Some("SUCCESS"));

        let requests = device.requests();
        let request = requests.last().expect("request recorded");
        assert_eq!(request["Command"]["RX ID"], json!("0x1234"));
        assert_eq!(request["Command"]["Query Type"], json!(5));
    }

    #[rstest]
    fn quotes_in_identifiers_stay_inside_the_value(timeouts: SessionTimeouts) {
        let device = FakeDevice::orion();
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let id = r#"0x12","Type":"reset_host"#;
        let outcome = session.send_recv(
            "register_rx",
            &Params::keyed([("clientid", id), ("querytype", "5")]),
        );
        assert!(outcome.reply().is_some());

        let requests = device.requests();
        let request = requests.last().expect("request recorded");
        assert_eq!(request["Command"]["Type"], json!("register_rx"));
        assert_eq!(request["Command"]["RX ID"], json!(id));
    }

    #[rstest]
    fn non_numeric_values_for_numeric_fields_send_nothing(timeouts: SessionTimeouts) {
        let device = FakeDevice::orion();
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv(
            "register_rx",
            &Params::keyed([("clientid", "0x12"), ("querytype", "five")]),
        );
        assert!(matches!(
            outcome,
            Exchange::Failed(SessionError::InvalidRequest { ref command, .. }) if command == "register_rx"
        ));
        assert!(session.is_connected());
        assert_eq!(device.request_types(), vec![PROBE_COMMAND]);
    }

    #[rstest]
    fn mismatched_argument_counts_send_defaults(timeouts: SessionTimeouts) {
        let device = FakeDevice::orion();
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv("set_comm_channel", &Params::text("25"));
        assert!(outcome.reply().is_some());

        let requests = device.requests();
        let request = requests.last().expect("request recorded");
        assert_eq!(request["Command"]["Channel"], json!(24));
        assert_eq!(request["Command"]["RX ID"], json!("0"));
    }

    #[rstest]
    fn split_replies_complete_one_exchange(timeouts: SessionTimeouts) {
        let device = FakeDevice::start(|request| match command_type(request) {
            "GetVersion" => Reply::json(json!({"Result": {"Version": "1"}})),
            _ => Reply::chunks([r#"{"Result":{"Sta"#, r#"tus":"SUCC"#, r#"ESS"}}"#]),
        });
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv("calibrate", &Params::None);
        assert_eq!(outcome.result_status(), Some("SUCCESS"));
    }

    #[rstest]
    fn silent_device_times_out_but_stays_connected(timeouts: SessionTimeouts) {
        let device = FakeDevice::start(|request| match command_type(request) {
            "GetVersion" => Reply::json(json!({"Result": {"Version": "1"}})),
            _ => Reply::Silent,
        });
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv("rx_list", &Params::None);
        assert!(matches!(outcome, Exchange::Timeout));
        assert_eq!(outcome.into_value(), json!({"Status": "TIMEOUT"}));
        assert!(session.is_connected());
    }

    #[rstest]
    fn late_replies_are_not_taken_for_the_next_answer(timeouts: SessionTimeouts) {
        let device = FakeDevice::start(|request| match command_type(request) {
            "GetVersion" => Reply::json(json!({"Result": {"Version": "1"}})),
            "rx_list" => Reply::Late(
                Duration::from_millis(400),
                json!({"Result": {"Status": "LATE"}}),
            ),
            _ => Reply::status("SUCCESS"),
        });
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        assert!(matches!(
            session.send_recv("rx_list", &Params::None),
            Exchange::Timeout
        ));
        std::thread::sleep(Duration::from_millis(250));

        let outcome = session.send_recv("calibrate", &Params::None);
        assert_eq!(outcome.result_status(), Some("SUCCESS"));
        assert!(session.is_connected());
    }

    #[rstest]
    fn peer_close_disconnects(timeouts: SessionTimeouts) {
        let device = FakeDevice::start(|request| match command_type(request) {
            "GetVersion" => Reply::json(json!({"Result": {"Version": "1"}})),
            _ => Reply::Close,
        });
        let mut session = Session::new(timeouts);
        session.connect("127.0.0.1", device.port()).expect("connect");

        let outcome = session.send_recv("rx_list", &Params::None);
        assert!(matches!(outcome, Exchange::Failed(SessionError::Closed)));
        assert!(!session.is_connected());
        assert!(matches!(
            session.send_recv("rx_list", &Params::None),
            Exchange::NotConnected
        ));
    }

    #[rstest]
    fn connect_failure_leaves_session_disconnected(timeouts: SessionTimeouts) {
        let port = FakeDevice::unused_port();
        let mut session = Session::new(timeouts);
        let error = session.connect("127.0.0.1", port).expect_err("refused");
        assert!(matches!(error, SessionError::Connect { .. }));
        assert!(!session.is_connected());
    }

    #[test]
    fn text_params_split_on_whitespace() {
        assert_eq!(Params::text("  a  b\tc ").values(), vec!["a", "b", "c"]);
        assert!(Params::text("").values().is_empty());
    }
}
