//! Remote receiver logging on the transmitter host.

use camino::Utf8Path;
use serde_json::Value;

use super::{Transmitter, text_of};
use crate::dispatch::HandlerError;
use crate::remote::RemoteError;

impl Transmitter {
    /// Opens the logger shell with the given credentials.
    pub fn connect_log(&mut self, username: &str, password: &str) -> Result<Value, HandlerError> {
        let dialect = self.connected_dialect()?;
        let host = self.host()?;
        self.logs.connect(&host, dialect, username, password)?;
        Ok(Value::from("SSH CONNECTED"))
    }

    /// Lists log files on the transmitter, newest first.
    pub fn list_logs(&mut self) -> Result<Value, HandlerError> {
        let files = self.logs.list_files()?;
        serde_json::to_value(files)
            .map_err(|error| RemoteError::operation("list logs", error.to_string()).into())
    }

    /// Copies a log file to `local`.
    pub fn download_log(&mut self, local: &Utf8Path, remote: &str) -> Result<Value, HandlerError> {
        let bytes = self.logs.download(local, remote)?;
        Ok(Value::from(format!("{bytes} bytes transferred")))
    }

    pub fn delete_log(&mut self, remote: &str) -> Result<Value, HandlerError> {
        self.logs.delete(remote)?;
        Ok(Value::from("DELETED"))
    }

    /// Starts logging `receivers`, given as a list or comma-separated text.
    pub fn start_log(
        &mut self,
        receivers: &Value,
        hours: u64,
        interval_secs: u64,
    ) -> Result<Value, HandlerError> {
        let receivers = match receivers {
            Value::Array(ids) => ids.iter().map(text_of).collect::<Vec<_>>().join(","),
            other => text_of(other),
        };
        match self.logs.start_logging(&receivers, hours, interval_secs)? {
            0 => Ok(Value::from("LOG STARTED")),
            status => Err(HandlerError::device("START_LOG", status.to_string())),
        }
    }

    /// Stops a running logger.
    pub fn stop_log(&mut self) -> Result<Value, HandlerError> {
        match self.logs.stop_logging()? {
            0 => Ok(Value::from("LOG ENDED")),
            status => Err(HandlerError::device(
                "STOP_LOG",
                format!("{status} (no running log)"),
            )),
        }
    }
}
