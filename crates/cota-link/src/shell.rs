//! Line-oriented operator shell.
//!
//! Each input line is either a command tag followed by whitespace-separated
//! arguments (`register_rx 0x1234`, `rx_config 0x1234 7`) or one of the local
//! directives `whitelist <path>` and `auto-assign start|stop`. Arguments that
//! parse as JSON keep their JSON type; everything else is passed as text.
//! Every result, local or dispatched, is written to the output as one JSON
//! line. End of input requests shutdown once queued commands have been
//! taken; the shell returns after the `QUIT` result has been written.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;

use camino::Utf8PathBuf;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auto_assign::AutoAssignOutcome;
use crate::dispatch::{CommandEnvelope, CommandKind, DispatchError, ResultEnvelope};
use crate::engine::Engine;

const SHELL_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::shell");

const WHITELIST_DIRECTIVE: &str = "whitelist";
const AUTO_ASSIGN_DIRECTIVE: &str = "auto-assign";

/// Errors that end a shell session.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Reading input or writing output failed.
    #[error("shell I/O failed: {0}")]
    Io(#[from] io::Error),
    /// A result could not be encoded.
    #[error("failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
    /// The dispatcher did not shut down cleanly.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// What to do with auto-assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAssignAction {
    /// Start the worker.
    Start,
    /// Stop the worker.
    Stop,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellLine {
    /// Blank line or comment.
    Empty,
    /// A command for the dispatcher.
    Command(CommandEnvelope),
    /// Replace the whitelist from a CSV file.
    LoadWhitelist(Utf8PathBuf),
    /// Start or stop auto-assignment.
    AutoAssign(AutoAssignAction),
    /// A local directive with bad arguments.
    Usage {
        /// The directive.
        directive: &'static str,
        /// Expected form.
        usage: &'static str,
    },
}

/// Parses one input line.
#[must_use]
pub fn parse_line(line: &str) -> ShellLine {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return ShellLine::Empty;
    }
    let mut tokens = line.split_whitespace();
    let Some(tag) = tokens.next() else {
        return ShellLine::Empty;
    };
    let rest: Vec<&str> = tokens.collect();
    match tag {
        WHITELIST_DIRECTIVE => match rest.as_slice() {
            [path] => ShellLine::LoadWhitelist(Utf8PathBuf::from(*path)),
            _ => ShellLine::Usage {
                directive: WHITELIST_DIRECTIVE,
                usage: "whitelist <path>",
            },
        },
        AUTO_ASSIGN_DIRECTIVE => match rest.as_slice() {
            ["start"] => ShellLine::AutoAssign(AutoAssignAction::Start),
            ["stop"] => ShellLine::AutoAssign(AutoAssignAction::Stop),
            _ => ShellLine::Usage {
                directive: AUTO_ASSIGN_DIRECTIVE,
                usage: "auto-assign start|stop",
            },
        },
        _ => {
            let payload: Vec<Value> = rest.iter().map(|token| argument(token)).collect();
            ShellLine::Command(CommandEnvelope::from_tag(
                tag,
                (!payload.is_empty()).then_some(payload),
            ))
        }
    }
}

fn argument(token: &str) -> Value {
    serde_json::from_str(token).unwrap_or_else(|_| Value::from(token))
}

/// Drives an [`Engine`] from `input`, writing results to `output`.
pub struct Shell<W> {
    engine: Engine,
    output: W,
    quit_requested: bool,
}

impl<W: Write> Shell<W> {
    /// Wraps a running engine.
    pub fn new(engine: Engine, output: W) -> Self {
        Self {
            engine,
            output,
            quit_requested: false,
        }
    }

    /// Reads lines until end of input, then shuts the engine down.
    pub fn run<R>(mut self, input: R) -> Result<(), ShellError>
    where
        R: BufRead + Send + 'static,
    {
        let lines = spawn_reader(input)?;
        let poll = self.engine.config().result_poll_interval();
        let mut input_open = true;
        loop {
            if input_open {
                match lines.recv_timeout(poll) {
                    Ok(Ok(line)) => self.handle(&line)?,
                    Ok(Err(error)) => {
                        warn!(target: SHELL_TARGET, %error, "input failed; shutting down");
                        input_open = false;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!(target: SHELL_TARGET, "end of input");
                        input_open = false;
                    }
                }
            } else {
                self.finish_input();
                thread::sleep(poll);
            }
            if self.flush_results()? || self.engine.dispatcher_finished() {
                break;
            }
        }
        self.flush_results()?;
        info!(target: SHELL_TARGET, "shell exiting");
        self.engine.shutdown()?;
        Ok(())
    }

    fn handle(&mut self, line: &str) -> Result<(), ShellError> {
        match parse_line(line) {
            ShellLine::Empty => Ok(()),
            ShellLine::Command(envelope) => {
                if envelope.is_quit() {
                    self.quit_requested = true;
                }
                let tag = envelope.tag.clone();
                match self.engine.commands().send(envelope) {
                    Ok(()) => Ok(()),
                    Err(error) => self.write(&ResultEnvelope::error(tag, error.to_string())),
                }
            }
            ShellLine::LoadWhitelist(path) => {
                let result = match self.engine.load_whitelist(&path) {
                    Ok(load) => ResultEnvelope::value(
                        WHITELIST_DIRECTIVE,
                        json!({
                            "entries": load.whitelist.len(),
                            "rejected": load
                                .rejected
                                .iter()
                                .map(ToString::to_string)
                                .collect::<Vec<_>>(),
                        }),
                    ),
                    Err(error) => ResultEnvelope::error(WHITELIST_DIRECTIVE, error.to_string()),
                };
                self.write(&result)
            }
            ShellLine::AutoAssign(action) => {
                let result = self.auto_assign(action);
                self.write(&result)
            }
            ShellLine::Usage { directive, usage } => {
                self.write(&ResultEnvelope::error(directive, format!("usage: {usage}")))
            }
        }
    }

    fn auto_assign(&mut self, action: AutoAssignAction) -> ResultEnvelope {
        let outcome = match action {
            AutoAssignAction::Start => self.engine.start_auto_assign().map(|()| "STARTED"),
            AutoAssignAction::Stop => self
                .engine
                .stop_auto_assign()
                .map(|outcome| outcome.map_or("NOT RUNNING", outcome_label)),
        };
        match outcome {
            Ok(label) => ResultEnvelope::value(AUTO_ASSIGN_DIRECTIVE, Value::from(label)),
            Err(error) => ResultEnvelope::error(AUTO_ASSIGN_DIRECTIVE, error.to_string()),
        }
    }

    /// Requests shutdown once every queued command has been taken.
    ///
    /// `QUIT` discards the backlog, so it waits for the queue to drain; the
    /// command in flight still completes first.
    fn finish_input(&mut self) {
        if self.quit_requested {
            return;
        }
        if self.engine.auto_assign_running() {
            if let Err(error) = self.engine.stop_auto_assign() {
                warn!(target: SHELL_TARGET, %error, "auto-assign worker ended abnormally");
            }
        }
        if matches!(self.engine.commands().pending(), Ok(pending) if pending > 0) {
            return;
        }
        self.quit_requested = true;
        if let Err(error) = self.engine.commands().request_quit() {
            debug!(target: SHELL_TARGET, %error, "dispatcher already stopped");
        }
    }

    /// Writes every pending result. Returns true once `QUIT` was answered.
    fn flush_results(&mut self) -> Result<bool, ShellError> {
        let mut quit_answered = false;
        for result in self.engine.results().drain() {
            quit_answered |= result.tag == CommandKind::Quit.tag();
            self.write(&result)?;
        }
        Ok(quit_answered)
    }

    fn write(&mut self, result: &ResultEnvelope) -> Result<(), ShellError> {
        serde_json::to_writer(&mut self.output, result)?;
        self.output.write_all(b"\n")?;
        self.output.flush()?;
        Ok(())
    }
}

const fn outcome_label(outcome: AutoAssignOutcome) -> &'static str {
    match outcome {
        AutoAssignOutcome::Completed => "COMPLETED",
        AutoAssignOutcome::Cancelled => "CANCELLED",
        AutoAssignOutcome::QueueClosed => "QUEUE CLOSED",
    }
}

fn spawn_reader<R>(input: R) -> Result<mpsc::Receiver<io::Result<String>>, ShellError>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("cota-shell-input".to_owned())
        .spawn(move || {
            for line in input.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}
