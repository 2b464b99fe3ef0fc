//! Remote editing of the Venus configuration document.
//!
//! The document is a JSON array of entries, each carrying at least `Name`,
//! `Type` and `Value`. Entry key order is preserved across a download/upload
//! cycle and uploads always back up the previous file first.

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::{REMOTE_TARGET, RemoteError, RemoteShell, RemoteTarget};

/// Location of the configuration document on the transmitter.
pub const REMOTE_CONFIG_PATH: &str = "/etc/cota/Cota_Config.json";

const CONFIG_ACCOUNT: &str = "gumstix";
const PRIMARY_PORT: u16 = 22;
const FALLBACK_PORT: u16 = 2222;

/// One configuration entry, keys kept in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ConfigEntry(Map<String, Value>);

impl ConfigEntry {
    /// Entry name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("Name").and_then(Value::as_str)
    }

    /// Declared value type, such as `string`, `hex32` or `int`.
    #[must_use]
    pub fn kind(&self) -> Option<&str> {
        self.0.get("Type").and_then(Value::as_str)
    }

    /// Current value.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        self.0.get("Value")
    }

    fn set_value(&mut self, value: Value) {
        self.0.insert("Value".to_owned(), value);
    }
}

/// The downloaded configuration document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RemoteConfig {
    entries: Vec<ConfigEntry>,
}

impl RemoteConfig {
    /// Parses a configuration document.
    pub fn parse(bytes: &[u8]) -> Result<Self, RemoteError> {
        let entries: Vec<Map<String, Value>> =
            serde_json::from_slice(bytes).map_err(|error| RemoteError::Document {
                message: error.to_string(),
            })?;
        Ok(Self {
            entries: entries.into_iter().map(ConfigEntry).collect(),
        })
    }

    /// Every entry in document order.
    #[must_use]
    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }

    /// Entry names mapped to their values.
    #[must_use]
    pub fn values(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .filter_map(|entry| Some((entry.name()?.to_owned(), entry.value()?.clone())))
            .collect()
    }

    /// Replaces the value of entry `name`, coercing `raw` to the entry type.
    ///
    /// `string` and `hex32` entries keep the text; every other type is parsed
    /// as an integer.
    pub fn update_value(&mut self, name: &str, raw: &str) -> Result<(), RemoteError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.name() == Some(name))
            .ok_or_else(|| RemoteError::UnknownEntry {
                name: name.to_owned(),
            })?;
        let value = match entry.kind() {
            Some("string" | "hex32") => Value::String(raw.to_owned()),
            _ => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| RemoteError::InvalidValue {
                    name: name.to_owned(),
                    value: raw.to_owned(),
                })?,
        };
        entry.set_value(value);
        Ok(())
    }

    /// Renders the document with three-space indentation and ` : ` between
    /// keys and values, followed by a newline.
    pub fn render(&self) -> Result<Vec<u8>, RemoteError> {
        let mut buffer = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut buffer, DocumentFormatter::new());
        self.entries
            .serialize(&mut serializer)
            .map_err(|error| RemoteError::Document {
                message: error.to_string(),
            })?;
        buffer.push(b'\n');
        Ok(buffer)
    }

    /// Downloads and parses the document from `host`.
    pub fn download(shell: &mut dyn RemoteShell, host: &str) -> Result<Self, RemoteError> {
        open(shell, host)?;
        let outcome = fix_permissions(shell).and_then(|()| shell.read_file(REMOTE_CONFIG_PATH));
        shell.disconnect();
        let config = Self::parse(&outcome?)?;
        info!(target: REMOTE_TARGET, host, entries = config.entries.len(), "downloaded configuration");
        Ok(config)
    }

    /// Backs up the remote document and replaces it with this one.
    pub fn upload(
        &self,
        shell: &mut dyn RemoteShell,
        host: &str,
        now: OffsetDateTime,
    ) -> Result<(), RemoteError> {
        let document = self.render()?;
        open(shell, host)?;
        let outcome = backup(shell, now)
            .and_then(|()| fix_permissions(shell))
            .and_then(|()| shell.write_file(REMOTE_CONFIG_PATH, &document));
        shell.disconnect();
        outcome?;
        info!(target: REMOTE_TARGET, host, "uploaded configuration");
        Ok(())
    }
}

/// Backup suffix in `DDMMYYYY_HHMMSS` form.
#[must_use]
pub fn backup_suffix(now: OffsetDateTime) -> String {
    format!(
        "{:02}{:02}{:04}_{:02}{:02}{:02}",
        now.day(),
        u8::from(now.month()),
        now.year(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

fn open(shell: &mut dyn RemoteShell, host: &str) -> Result<(), RemoteError> {
    let target = RemoteTarget::new(host, PRIMARY_PORT, CONFIG_ACCOUNT, CONFIG_ACCOUNT);
    match shell.connect(&target) {
        Err(RemoteError::Authentication { .. }) => {
            debug!(target: REMOTE_TARGET, host, port = FALLBACK_PORT, "retrying on fallback port");
            shell.connect(&target.with_port(FALLBACK_PORT))
        }
        other => other,
    }
}

fn fix_permissions(shell: &mut dyn RemoteShell) -> Result<(), RemoteError> {
    shell
        .execute(&format!("sudo chmod 666 {REMOTE_CONFIG_PATH}"))
        .map(drop)
}

fn backup(shell: &mut dyn RemoteShell, now: OffsetDateTime) -> Result<(), RemoteError> {
    let command = format!(
        "sudo cp {REMOTE_CONFIG_PATH} {REMOTE_CONFIG_PATH}.bak_{}",
        backup_suffix(now)
    );
    shell.execute(&command).map(drop)
}

/// Pretty printer that separates keys from values with ` : `.
struct DocumentFormatter<'a> {
    inner: PrettyFormatter<'a>,
}

impl DocumentFormatter<'_> {
    fn new() -> Self {
        Self {
            inner: PrettyFormatter::with_indent(b"   "),
        }
    }
}

impl Formatter for DocumentFormatter<'_> {
    fn begin_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_array(writer)
    }

    fn end_array<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array(writer)
    }

    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_array_value(writer, first)
    }

    fn end_array_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_array_value(writer)
    }

    fn begin_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.begin_object(writer)
    }

    fn end_object<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object(writer)
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        self.inner.begin_object_key(writer, first)
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b" : ")
    }

    fn end_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        self.inner.end_object_value(writer)
    }
}
