//! Control of the on-transmitter receiver logger.

use camino::Utf8Path;
use tracing::{debug, info};

use super::{REMOTE_TARGET, RemoteError, RemoteFile, RemoteShell, RemoteTarget};
use crate::catalog::Dialect;

const FALLBACK_PORT: u16 = 22;
const SECONDS_PER_HOUR: u64 = 3600;

/// Where the logger lives on each kind of transmitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogProfile {
    /// Preferred shell port.
    pub port: u16,
    /// Script directory; log files are written alongside.
    pub directory: &'static str,
    /// Logger script name.
    pub script: &'static str,
}

impl LogProfile {
    /// Profile for `dialect`.
    #[must_use]
    pub const fn for_dialect(dialect: Dialect) -> Self {
        match dialect {
            Dialect::Orion => Self {
                port: 22,
                directory: "/home/pi/scripts/",
                script: "OrionLogger.py",
            },
            Dialect::Venus => Self {
                port: 2222,
                directory: "/home/gumstix/scripts/",
                script: "logClientDetailRemote.py",
            },
        }
    }

    /// Command that launches the logger in the background.
    pub fn start_command(
        &self,
        receivers: &str,
        hours: u64,
        interval_secs: u64,
    ) -> Result<String, RemoteError> {
        let samples = hours
            .saturating_mul(SECONDS_PER_HOUR)
            .checked_div(interval_secs)
            .ok_or(RemoteError::InvalidInterval)?;
        Ok(format!(
            "cd {};nohup python3 {} -t localhost -c {receivers} -n {samples} -d {interval_secs} &",
            self.directory, self.script
        ))
    }

    /// Command that stops every logger owned by `username`.
    #[must_use]
    pub fn stop_command(&self, username: &str) -> String {
        format!("pkill -u {username} -f {}", self.script)
    }

    fn path_of(&self, name: &str) -> String {
        format!("{}{name}", self.directory)
    }
}

#[derive(Debug)]
struct LogSession {
    profile: LogProfile,
    username: String,
}

/// Connects to the transmitter host and drives the logger script.
pub struct RemoteLogManager {
    shell: Box<dyn RemoteShell>,
    session: Option<LogSession>,
}

impl RemoteLogManager {
    /// Wraps `shell`.
    #[must_use]
    pub fn new(shell: Box<dyn RemoteShell>) -> Self {
        Self {
            shell,
            session: None,
        }
    }

    /// Returns true after a successful [`Self::connect`].
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Opens a shell on `host`, returning the port that accepted.
    ///
    /// Venus hosts are tried on their preferred port first, then on port 22.
    pub fn connect(
        &mut self,
        host: &str,
        dialect: Dialect,
        username: &str,
        password: &str,
    ) -> Result<u16, RemoteError> {
        self.disconnect();
        let profile = LogProfile::for_dialect(dialect);
        let target = RemoteTarget::new(host, profile.port, username, password);
        let port = match self.shell.connect(&target) {
            Ok(()) => profile.port,
            Err(error) if dialect == Dialect::Venus && profile.port != FALLBACK_PORT => {
                debug!(target: REMOTE_TARGET, host, %error, "retrying logger shell on port 22");
                self.shell.connect(&target.with_port(FALLBACK_PORT))?;
                FALLBACK_PORT
            }
            Err(error) => return Err(error),
        };
        info!(target: REMOTE_TARGET, host, port, "logger shell connected");
        self.session = Some(LogSession {
            profile,
            username: username.to_owned(),
        });
        Ok(port)
    }

    /// Closes the shell, if open.
    pub fn disconnect(&mut self) {
        if self.session.take().is_some() {
            self.shell.disconnect();
        }
    }

    fn session(&self) -> Result<&LogSession, RemoteError> {
        self.session.as_ref().ok_or(RemoteError::NotConnected)
    }

    /// Starts logging `receivers` for `hours`, sampling every `interval_secs`.
    /// Returns the launcher's exit status.
    pub fn start_logging(
        &mut self,
        receivers: &str,
        hours: u64,
        interval_secs: u64,
    ) -> Result<i32, RemoteError> {
        let command = self
            .session()?
            .profile
            .start_command(receivers, hours, interval_secs)?;
        self.shell.execute(&command)
    }

    /// Stops the logger. Returns the exit status of the kill command.
    pub fn stop_logging(&mut self) -> Result<i32, RemoteError> {
        let session = self.session()?;
        let command = session.profile.stop_command(&session.username);
        self.shell.execute(&command)
    }

    /// Lists the log directory, newest first.
    pub fn list_files(&mut self) -> Result<Vec<RemoteFile>, RemoteError> {
        let directory = self.session()?.profile.directory;
        let mut files = self.shell.list_dir(directory)?;
        files.sort_by(|left, right| right.modified.cmp(&left.modified));
        Ok(files)
    }

    /// Downloads `remote_name` from the log directory to `local`.
    pub fn download(&mut self, local: &Utf8Path, remote_name: &str) -> Result<u64, RemoteError> {
        let path = self.session()?.profile.path_of(remote_name);
        self.shell.download(&path, local)
    }

    /// Deletes `remote_name` from the log directory.
    pub fn delete(&mut self, remote_name: &str) -> Result<(), RemoteError> {
        let path = self.session()?.profile.path_of(remote_name);
        self.shell.remove(&path)
    }
}

impl std::fmt::Debug for RemoteLogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLogManager")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
