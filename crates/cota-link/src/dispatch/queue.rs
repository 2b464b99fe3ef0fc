//! Bounded command queue with a shutdown fast path.
//!
//! Producers block while the queue is full. The shutdown command never
//! enters the FIFO: it raises a flag that the consumer observes before any
//! queued work, and the backlog is discarded when the consumer takes it.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::DISPATCH_TARGET;
use super::command::CommandEnvelope;
use super::errors::QueueError;

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<CommandEnvelope>,
    quit_requested: bool,
    closed: bool,
}

#[derive(Debug)]
struct CommandQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl CommandQueue {
    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state.lock().map_err(|_| QueueError::Poisoned)
    }
}

/// Creates a queue holding at most `capacity` pending commands.
pub(crate) fn command_queue(capacity: usize) -> (CommandSender, CommandReceiver) {
    let queue = Arc::new(CommandQueue {
        state: Mutex::new(QueueState::default()),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        capacity: capacity.max(1),
    });
    (
        CommandSender {
            queue: Arc::clone(&queue),
        },
        CommandReceiver { queue },
    )
}

/// Producer handle. Cheap to clone and safe to share across threads.
#[derive(Debug, Clone)]
pub struct CommandSender {
    queue: Arc<CommandQueue>,
}

impl CommandSender {
    /// Enqueues `envelope`, blocking while the queue is full.
    ///
    /// The shutdown command is routed to [`Self::request_quit`] and never
    /// blocks.
    pub fn send(&self, envelope: CommandEnvelope) -> Result<(), QueueError> {
        if envelope.is_quit() {
            return self.request_quit();
        }
        let mut state = self.queue.lock()?;
        while state.items.len() >= self.queue.capacity && !state.closed {
            state = self
                .queue
                .not_full
                .wait(state)
                .map_err(|_| QueueError::Poisoned)?;
        }
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.items.push_back(envelope);
        drop(state);
        self.queue.not_empty.notify_one();
        Ok(())
    }

    /// Asks the consumer to shut down ahead of any queued work.
    pub fn request_quit(&self) -> Result<(), QueueError> {
        let mut state = self.queue.lock()?;
        if state.closed {
            return Err(QueueError::Closed);
        }
        state.quit_requested = true;
        drop(state);
        self.queue.not_empty.notify_all();
        Ok(())
    }

    /// Number of commands waiting.
    pub fn pending(&self) -> Result<usize, QueueError> {
        Ok(self.queue.lock()?.items.len())
    }

    /// Returns true once the consumer has shut down.
    pub fn is_closed(&self) -> bool {
        self.queue.lock().map_or(true, |state| state.closed)
    }
}

/// Consumer handle owned by the dispatcher.
#[derive(Debug)]
pub(crate) struct CommandReceiver {
    queue: Arc<CommandQueue>,
}

impl CommandReceiver {
    /// Takes the next command, waiting up to `wait`.
    ///
    /// A pending shutdown request is returned before any queued command and
    /// discards the backlog. Returns `Ok(None)` when the wait elapses.
    pub(crate) fn next(&self, wait: Duration) -> Result<Option<CommandEnvelope>, QueueError> {
        let deadline = Instant::now() + wait;
        let mut state = self.queue.lock()?;
        loop {
            if state.quit_requested {
                state.quit_requested = false;
                let discarded = state.items.len();
                state.items.clear();
                drop(state);
                self.queue.not_full.notify_all();
                if discarded > 0 {
                    info!(target: DISPATCH_TARGET, discarded, "shutdown preempted queued commands");
                }
                return Ok(Some(CommandEnvelope::quit()));
            }
            if let Some(envelope) = state.items.pop_front() {
                drop(state);
                self.queue.not_full.notify_one();
                return Ok(Some(envelope));
            }
            if state.closed {
                return Err(QueueError::Closed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            let (guard, _) = self
                .queue
                .not_empty
                .wait_timeout(state, remaining)
                .map_err(|_| QueueError::Poisoned)?;
            state = guard;
        }
    }

    /// Returns true while a shutdown request waits to be taken.
    pub(crate) fn quit_pending(&self) -> bool {
        self.queue.lock().map_or(true, |state| state.quit_requested)
    }

    /// Refuses further commands and wakes every blocked producer.
    pub(crate) fn close(&self) {
        match self.queue.lock() {
            Ok(mut state) => {
                state.closed = true;
                let discarded = state.items.len();
                state.items.clear();
                if discarded > 0 {
                    debug!(target: DISPATCH_TARGET, discarded, "dropped commands at close");
                }
            }
            Err(_) => debug!(target: DISPATCH_TARGET, "queue lock poisoned at close"),
        }
        self.queue.not_full.notify_all();
        self.queue.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;

    use super::*;
    use crate::dispatch::CommandKind;

    const SHORT: Duration = Duration::from_millis(20);

    fn envelope(tag: &str) -> CommandEnvelope {
        CommandEnvelope::from_tag(tag, None)
    }

    #[test]
    fn commands_are_delivered_in_order() {
        let (sender, receiver) = command_queue(4);
        for tag in ["rx_list", "lpm_list", "get_tx_id"] {
            sender.send(envelope(tag)).expect("send");
        }
        let tags: Vec<String> = (0..3)
            .map(|_| receiver.next(SHORT).expect("next").expect("item").tag)
            .collect();
        assert_eq!(tags, ["rx_list", "lpm_list", "get_tx_id"]);
    }

    #[test]
    fn empty_queue_waits_then_yields_nothing() {
        let (_sender, receiver) = command_queue(4);
        let started = Instant::now();
        assert_eq!(receiver.next(SHORT).expect("next"), None);
        assert!(started.elapsed() >= SHORT);
    }

    #[test]
    fn quit_preempts_and_discards_backlog() {
        let (sender, receiver) = command_queue(8);
        sender.send(envelope("rx_list")).expect("send");
        sender.send(envelope("lpm_list")).expect("send");
        sender.send(CommandEnvelope::quit()).expect("quit");

        let first = receiver.next(SHORT).expect("next").expect("item");
        assert_eq!(first.kind(), Some(CommandKind::Quit));
        assert_eq!(sender.pending().expect("pending"), 0);
    }

    #[test]
    fn producers_block_while_full() {
        let (sender, receiver) = command_queue(1);
        sender.send(envelope("first")).expect("send");

        let (done_tx, done_rx) = mpsc::channel();
        let blocked = sender.clone();
        let producer = thread::spawn(move || {
            blocked.send(envelope("second")).expect("send");
            done_tx.send(()).expect("signal");
        });

        assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());
        assert_eq!(receiver.next(SHORT).expect("next").expect("item").tag, "first");
        done_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("producer unblocked");
        producer.join().expect("producer thread");
        assert_eq!(receiver.next(SHORT).expect("next").expect("item").tag, "second");
    }

    #[test]
    fn closing_releases_blocked_producers() {
        let (sender, receiver) = command_queue(1);
        sender.send(envelope("first")).expect("send");
        let blocked = sender.clone();
        let producer = thread::spawn(move || blocked.send(envelope("second")));

        thread::sleep(Duration::from_millis(50));
        receiver.close();
        assert_eq!(producer.join().expect("producer"), Err(QueueError::Closed));
        assert!(sender.is_closed());
        assert_eq!(sender.send(envelope("third")), Err(QueueError::Closed));
        assert_eq!(sender.request_quit(), Err(QueueError::Closed));
    }
}
