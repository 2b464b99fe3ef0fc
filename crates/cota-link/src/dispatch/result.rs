//! Result envelopes and the non-blocking result stream.

use std::ops::ControlFlow;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

/// Payload of a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultData {
    /// The handler's return value.
    Value(Value),
    /// The handler returned an error.
    Error(String),
    /// The handler panicked.
    Fault(String),
}

/// One result, tagged with the command that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultEnvelope {
    /// Tag of the originating command.
    pub tag: String,
    /// What the handler produced.
    pub data: ResultData,
}

impl ResultEnvelope {
    /// Builds a value result.
    pub fn value(tag: impl Into<String>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            data: ResultData::Value(value),
        }
    }

    /// Builds an error result.
    pub fn error(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: ResultData::Error(message.into()),
        }
    }

    /// Builds a fault result.
    pub fn fault(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            data: ResultData::Fault(message.into()),
        }
    }

    /// The value, when the handler succeeded.
    #[must_use]
    pub const fn as_value(&self) -> Option<&Value> {
        match &self.data {
            ResultData::Value(value) => Some(value),
            _ => None,
        }
    }
}

/// Consumer side of the result queue.
///
/// Results are only ever taken without blocking; callers that want to wait
/// poll at a fixed interval.
#[derive(Debug)]
pub struct ResultReceiver {
    receiver: Receiver<ResultEnvelope>,
    poll_interval: Duration,
}

impl ResultReceiver {
    pub(crate) const fn new(receiver: Receiver<ResultEnvelope>, poll_interval: Duration) -> Self {
        Self {
            receiver,
            poll_interval,
        }
    }

    /// Takes the next result if one is ready.
    #[must_use]
    pub fn try_next(&self) -> Option<ResultEnvelope> {
        self.receiver.try_recv().ok()
    }

    /// Takes every result that is ready now.
    #[must_use]
    pub fn drain(&self) -> Vec<ResultEnvelope> {
        self.receiver.try_iter().collect()
    }

    /// Polls until a result arrives, the producer side is gone, or `timeout`
    /// elapses.
    #[must_use]
    pub fn next_within(&self, timeout: Duration) -> Option<ResultEnvelope> {
        let deadline = Instant::now() + timeout;
        let mut found = None;
        self.poll_until(deadline, |envelope| {
            found = Some(envelope);
            ControlFlow::Break(())
        });
        found
    }

    /// Feeds results to `on_result` until it breaks or the dispatcher has
    /// stopped and every result has been delivered.
    pub fn poll<F>(&self, on_result: F)
    where
        F: FnMut(ResultEnvelope) -> ControlFlow<()>,
    {
        self.poll_loop(None, on_result);
    }

    fn poll_until<F>(&self, deadline: Instant, on_result: F)
    where
        F: FnMut(ResultEnvelope) -> ControlFlow<()>,
    {
        self.poll_loop(Some(deadline), on_result);
    }

    fn poll_loop<F>(&self, deadline: Option<Instant>, mut on_result: F)
    where
        F: FnMut(ResultEnvelope) -> ControlFlow<()>,
    {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => {
                    if on_result(envelope).is_break() {
                        return;
                    }
                }
                Err(TryRecvError::Disconnected) => return,
                Err(TryRecvError::Empty) => {
                    if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                        return;
                    }
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }
}
