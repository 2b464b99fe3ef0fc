//! Whitelist-driven automatic slot assignment.
//!
//! The worker wakes once per interval, compares the whitelist with what the
//! transmitter last reported, and feeds `lpm_assign` commands for visible,
//! still-unassigned receivers into the ordinary command queue. Entries leave
//! the whitelist once the device reports them in a slot; the worker exits
//! when the whitelist empties or it is cancelled.

mod state;
mod whitelist;

use std::collections::BTreeSet;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::thread::{self, JoinHandle, Thread};
use std::time::{Duration, Instant};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use state::{LiveSnapshot, LiveState};
pub use whitelist::{SharedWhitelist, Whitelist, WhitelistError, WhitelistLoad};

use crate::dispatch::{CommandEnvelope, CommandKind, CommandSender, QueueError};

const AUTO_ASSIGN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::auto_assign");

/// Slot argument asking the transmitter to pick the next free slot.
pub const NEXT_SLOT: &str = "NEXT";

/// Errors from [`AutoAssignController`].
#[derive(Debug, Error)]
pub enum AutoAssignError {
    /// Nothing to assign.
    #[error("No receivers in whitelist")]
    EmptyWhitelist,
    /// A worker is already running.
    #[error("auto-assign is already running")]
    AlreadyRunning,
    /// The worker thread could not be spawned.
    #[error("failed to spawn auto-assign thread: {0}")]
    Spawn(#[source] io::Error),
    /// The worker thread panicked.
    #[error("auto-assign thread panicked")]
    Panicked,
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoAssignOutcome {
    /// Every whitelisted receiver was assigned.
    Completed,
    /// Stopped on request.
    Cancelled,
    /// The dispatcher stopped accepting commands.
    QueueClosed,
}

/// What a single reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Ids removed from the whitelist because the device has them in a slot.
    pub pruned: Vec<String>,
    /// `(id, slot)` assignments enqueued; `None` means the next free slot.
    pub requested: Vec<(String, Option<u32>)>,
}

/// The reconciliation loop.
#[derive(Debug)]
pub struct AutoAssignWorker {
    whitelist: SharedWhitelist,
    live: LiveState,
    commands: CommandSender,
    interval: Duration,
    cancel: Arc<AtomicBool>,
}

impl AutoAssignWorker {
    /// Creates a worker; `cancel` is polled between cycles.
    #[must_use]
    pub const fn new(
        whitelist: SharedWhitelist,
        live: LiveState,
        commands: CommandSender,
        interval: Duration,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Self {
            whitelist,
            live,
            commands,
            interval,
            cancel,
        }
    }

    /// Runs one reconciliation pass.
    pub fn cycle(&self) -> Result<CycleReport, QueueError> {
        let snapshot = self.live.snapshot();
        let assigned: BTreeSet<&str> = snapshot.assigned.values().map(String::as_str).collect();

        let mut report = CycleReport::default();
        {
            let mut whitelist = self.whitelist.lock().unwrap_or_else(PoisonError::into_inner);
            for id in &assigned {
                if whitelist.remove(id) {
                    report.pruned.push((*id).to_owned());
                }
            }
            for id in &snapshot.visible {
                if whitelist.contains(id) {
                    report.requested.push((id.clone(), whitelist.slot(id)));
                }
            }
        }

        for id in &report.pruned {
            info!(target: AUTO_ASSIGN_TARGET, id = %id, "receiver assigned");
        }
        for (id, slot) in &report.requested {
            debug!(target: AUTO_ASSIGN_TARGET, id = %id, ?slot, "requesting slot");
            self.commands.send(assign_command(id, *slot))?;
        }
        Ok(report)
    }

    /// Cycles until cancelled, the whitelist empties, or the queue closes.
    pub fn run(self) -> AutoAssignOutcome {
        info!(target: AUTO_ASSIGN_TARGET, interval_ms = self.interval.as_millis(), "auto-assign started");
        let outcome = loop {
            if self.cancel.load(Ordering::Acquire) {
                break AutoAssignOutcome::Cancelled;
            }
            if self.remaining() == 0 {
                break AutoAssignOutcome::Completed;
            }
            if let Err(error) = self.cycle() {
                warn!(target: AUTO_ASSIGN_TARGET, %error, "command queue unavailable");
                break AutoAssignOutcome::QueueClosed;
            }
            if self.remaining() == 0 {
                break AutoAssignOutcome::Completed;
            }
            self.sleep();
        };
        info!(target: AUTO_ASSIGN_TARGET, ?outcome, "auto-assign stopped");
        outcome
    }

    fn remaining(&self) -> usize {
        self.whitelist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn sleep(&self) {
        let deadline = Instant::now() + self.interval;
        while !self.cancel.load(Ordering::Acquire) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            thread::park_timeout(remaining);
        }
    }
}

fn assign_command(id: &str, slot: Option<u32>) -> CommandEnvelope {
    let slot = slot.map_or_else(|| Value::from(NEXT_SLOT), Value::from);
    CommandEnvelope::new(CommandKind::LpmAssign, [Value::from(id), slot])
}

#[derive(Debug)]
struct RunningWorker {
    cancel: Arc<AtomicBool>,
    handle: JoinHandle<AutoAssignOutcome>,
}

impl RunningWorker {
    fn thread(&self) -> &Thread {
        self.handle.thread()
    }
}

/// Starts and stops the single auto-assign worker.
#[derive(Debug)]
pub struct AutoAssignController {
    whitelist: SharedWhitelist,
    live: LiveState,
    commands: CommandSender,
    interval: Duration,
    running: Option<RunningWorker>,
}

impl AutoAssignController {
    /// Creates a stopped controller.
    #[must_use]
    pub const fn new(
        whitelist: SharedWhitelist,
        live: LiveState,
        commands: CommandSender,
        interval: Duration,
    ) -> Self {
        Self {
            whitelist,
            live,
            commands,
            interval,
            running: None,
        }
    }

    /// Returns true while a worker thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|worker| !worker.handle.is_finished())
    }

    /// Starts a worker over the current whitelist.
    pub fn start(&mut self) -> Result<(), AutoAssignError> {
        if self.is_running() {
            return Err(AutoAssignError::AlreadyRunning);
        }
        if self
            .whitelist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
        {
            return Err(AutoAssignError::EmptyWhitelist);
        }
        if let Some(finished) = self.running.take() {
            let outcome = finished.handle.join();
            debug!(target: AUTO_ASSIGN_TARGET, ?outcome, "reaped previous worker");
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = AutoAssignWorker::new(
            Arc::clone(&self.whitelist),
            self.live.clone(),
            self.commands.clone(),
            self.interval,
            Arc::clone(&cancel),
        );
        let handle = thread::Builder::new()
            .name("cota-auto-assign".to_owned())
            .spawn(move || worker.run())
            .map_err(AutoAssignError::Spawn)?;
        self.running = Some(RunningWorker { cancel, handle });
        Ok(())
    }

    /// Cancels the worker and waits for it. Returns `Ok(None)` when no worker
    /// was started.
    pub fn stop(&mut self) -> Result<Option<AutoAssignOutcome>, AutoAssignError> {
        let Some(worker) = self.running.take() else {
            return Ok(None);
        };
        worker.cancel.store(true, Ordering::Release);
        worker.thread().unpark();
        worker
            .handle
            .join()
            .map(Some)
            .map_err(|_| AutoAssignError::Panicked)
    }
}

impl Drop for AutoAssignController {
    fn drop(&mut self) {
        if let Err(error) = self.stop() {
            warn!(target: AUTO_ASSIGN_TARGET, %error, "auto-assign worker ended abnormally");
        }
    }
}
