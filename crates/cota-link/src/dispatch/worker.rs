//! The single consumer that executes commands against a transmitter.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use super::DISPATCH_TARGET;

const RESULT_RETRY: Duration = Duration::from_millis(5);
use super::command::{Args, CommandEnvelope, CommandKind};
use super::errors::{DispatchError, HandlerError, QueueError};
use super::queue::CommandReceiver;
use super::result::{ResultData, ResultEnvelope};
use crate::health::HealthReporter;
use crate::session::NOT_CONNECTED;

/// Something commands can be executed against.
pub trait CommandTarget: Send {
    /// Returns true while a transmitter session is open.
    fn is_connected(&self) -> bool;

    /// Runs the handler registered for `kind`.
    fn execute(&mut self, kind: CommandKind, args: Args<'_>) -> Result<Value, HandlerError>;
}

/// Whether the worker keeps running after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Dispatcher state owned by the worker thread.
pub(crate) struct Dispatcher<T> {
    target: T,
    commands: CommandReceiver,
    results: SyncSender<ResultEnvelope>,
    dequeue_wait: Duration,
    reporter: Arc<dyn HealthReporter>,
    results_dropped: bool,
    stopping: bool,
}

impl<T> Dispatcher<T>
where
    T: CommandTarget + 'static,
{
    pub(crate) fn new(
        target: T,
        commands: CommandReceiver,
        results: SyncSender<ResultEnvelope>,
        dequeue_wait: Duration,
        reporter: Arc<dyn HealthReporter>,
    ) -> Self {
        Self {
            target,
            commands,
            results,
            dequeue_wait,
            reporter,
            results_dropped: false,
            stopping: false,
        }
    }

    /// Runs the worker on a named thread.
    pub(crate) fn spawn(self) -> Result<DispatcherHandle, DispatchError> {
        thread::Builder::new()
            .name("cota-dispatcher".to_owned())
            .spawn(move || self.run())
            .map(|handle| DispatcherHandle { handle })
            .map_err(DispatchError::Spawn)
    }

    /// Processes commands until the shutdown command has been answered.
    pub(crate) fn run(mut self) {
        self.reporter.dispatcher_started();
        loop {
            match self.commands.next(self.dequeue_wait) {
                Ok(Some(envelope)) => {
                    if self.process(envelope) == Flow::Stop {
                        break;
                    }
                }
                Ok(None) => trace!(target: DISPATCH_TARGET, "no command within wait"),
                Err(QueueError::Closed) => break,
                Err(error) => {
                    error!(target: DISPATCH_TARGET, %error, "command queue failed");
                    break;
                }
            }
        }
        self.commands.close();
        self.reporter.dispatcher_stopped();
    }

    fn process(&mut self, envelope: CommandEnvelope) -> Flow {
        let Some(kind) = envelope.kind() else {
            debug!(target: DISPATCH_TARGET, tag = %envelope.tag, "unrecognised command");
            let message = format!("unrecognised command: {}", envelope.tag);
            self.emit(ResultEnvelope::error(envelope.tag, message));
            return Flow::Continue;
        };

        if !kind.runs_disconnected() && !self.target.is_connected() {
            debug!(target: DISPATCH_TARGET, command = %kind, "rejected while disconnected");
            self.emit(ResultEnvelope::value(
                envelope.tag,
                Value::String(NOT_CONNECTED.to_owned()),
            ));
            return Flow::Continue;
        }

        if kind == CommandKind::Quit {
            self.stopping = true;
        }
        debug!(target: DISPATCH_TARGET, command = %kind, args = envelope.args().len(), "executing");
        let target = &mut self.target;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| target.execute(kind, envelope.args())));
        let data = match outcome {
            Ok(Ok(value)) => ResultData::Value(value),
            Ok(Err(error)) => {
                warn!(target: DISPATCH_TARGET, command = %kind, %error, "handler failed");
                ResultData::Error(error.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(target: DISPATCH_TARGET, command = %kind, message, "handler panicked");
                ResultData::Fault(message)
            }
        };
        self.emit(ResultEnvelope {
            tag: envelope.tag,
            data,
        });

        if kind == CommandKind::Quit {
            info!(target: DISPATCH_TARGET, "shutdown requested");
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Waits for room in the result stream. Once shutdown is pending, a full
    /// stream drops the result instead so the worker can reach `QUIT`.
    fn emit(&mut self, envelope: ResultEnvelope) {
        let mut envelope = envelope;
        loop {
            match self.results.try_send(envelope) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    if self.stopping || self.commands.quit_pending() {
                        warn!(
                            target: DISPATCH_TARGET,
                            tag = %returned.tag,
                            "result stream full during shutdown; result dropped"
                        );
                        return;
                    }
                    envelope = returned;
                    thread::sleep(RESULT_RETRY);
                }
                Err(TrySendError::Disconnected(_)) => {
                    if !self.results_dropped {
                        warn!(target: DISPATCH_TARGET, "result receiver dropped; discarding results");
                        self.results_dropped = true;
                    }
                    return;
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_owned()
    }
}

/// Handle to the running dispatcher thread.
#[derive(Debug)]
pub struct DispatcherHandle {
    handle: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Returns true once the worker has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker to exit.
    pub fn join(self) -> Result<(), DispatchError> {
        self.handle.join().map_err(|_| DispatchError::Panicked)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::mpsc;

    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::dispatch::queue::command_queue;
    use crate::dispatch::{CommandSender, ResultReceiver};
    use crate::tests::support::{HealthEvent, RecordingHealthReporter};

    /// Target that records invocations and answers from a fixed script.
    #[derive(Clone, Default)]
    struct RecordingTarget {
        connected: Arc<Mutex<bool>>,
        calls: Arc<Mutex<Vec<CommandKind>>>,
    }

    impl RecordingTarget {
        fn calls(&self) -> Vec<CommandKind> {
            self.calls.lock().expect("calls").clone()
        }
    }

    impl CommandTarget for RecordingTarget {
        fn is_connected(&self) -> bool {
            *self.connected.lock().expect("connected")
        }

        fn execute(&mut self, kind: CommandKind, args: Args<'_>) -> Result<Value, HandlerError> {
            self.calls.lock().expect("calls").push(kind);
            match kind {
                CommandKind::Connect => {
                    *self.connected.lock().expect("connected") = true;
                    Ok(json!(true))
                }
                CommandKind::Quit => {
                    *self.connected.lock().expect("connected") = false;
                    Ok(json!("SUCCESS"))
                }
                CommandKind::RxDetail => Ok(json!({ "id": args.text(0, "id")? })),
                CommandKind::LpmFree => panic!("slot table corrupted"),
                _ => Ok(json!("SUCCESS")),
            }
        }
    }

    struct Harness {
        target: RecordingTarget,
        sender: CommandSender,
        results: ResultReceiver,
        reporter: Arc<RecordingHealthReporter>,
        handle: Option<DispatcherHandle>,
    }

    impl Harness {
        fn send(&self, tag: &str, args: &[&str]) {
            let payload = (!args.is_empty()).then(|| args.iter().map(|arg| json!(arg)).collect());
            self.sender
                .send(CommandEnvelope::from_tag(tag, payload))
                .expect("enqueue");
        }

        fn next(&self) -> ResultEnvelope {
            self.results
                .next_within(Duration::from_secs(2))
                .expect("result within deadline")
        }

        fn stop(&mut self) {
            let _ = self.sender.request_quit();
            if let Some(handle) = self.handle.take() {
                handle.join().expect("dispatcher joins");
            }
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let target = RecordingTarget::default();
        let (sender, receiver) = command_queue(8);
        let (result_tx, result_rx) = mpsc::sync_channel(8);
        let reporter = Arc::new(RecordingHealthReporter::default());
        let dispatcher = Dispatcher::new(
            target.clone(),
            receiver,
            result_tx,
            Duration::from_millis(20),
            reporter.clone(),
        );
        let handle = dispatcher.spawn().expect("spawn dispatcher");
        Harness {
            target,
            sender,
            results: ResultReceiver::new(result_rx, Duration::from_millis(2)),
            reporter,
            handle: Some(handle),
        }
    }

    #[rstest]
    fn disconnected_commands_are_refused_without_invocation(mut harness: Harness) {
        harness.send("rx_list", &[]);
        let result = harness.next();
        assert_eq!(result.tag, "rx_list");
        assert_eq!(result.data, ResultData::Value(json!("Not Connected")));
        assert!(harness.target.calls().is_empty());
        harness.stop();
    }

    #[rstest]
    fn connected_commands_reach_the_target(mut harness: Harness) {
        harness.send("CONNECT", &["127.0.0.1"]);
        harness.send("rx_detail", &["0xAB"]);
        assert_eq!(harness.next().data, ResultData::Value(json!(true)));
        assert_eq!(
            harness.next().data,
            ResultData::Value(json!({"id": "0xAB"}))
        );
        assert_eq!(
            harness.target.calls(),
            [CommandKind::Connect, CommandKind::RxDetail]
        );
        harness.stop();
    }

    #[rstest]
    fn unknown_tags_still_produce_one_result(mut harness: Harness) {
        harness.send("FROBNICATE", &[]);
        let result = harness.next();
        assert_eq!(result.tag, "FROBNICATE");
        assert!(matches!(result.data, ResultData::Error(ref message) if message.contains("FROBNICATE")));
        assert!(harness.target.calls().is_empty());
        harness.stop();
    }

    #[rstest]
    fn handler_errors_and_panics_do_not_stop_the_worker(mut harness: Harness) {
        harness.send("CONNECT", &["127.0.0.1"]);
        harness.send("rx_detail", &[]);
        harness.send("lpm_free", &["3"]);
        harness.send("rx_list", &[]);

        let _connected = harness.next();
        assert!(matches!(
            harness.next().data,
            ResultData::Error(ref message) if message == "missing argument: id"
        ));
        assert_eq!(
            harness.next().data,
            ResultData::Fault("slot table corrupted".to_owned())
        );
        assert_eq!(harness.next().data, ResultData::Value(json!("SUCCESS")));
        harness.stop();
    }

    #[test]
    fn unread_results_do_not_block_shutdown() {
        let (sender, receiver) = command_queue(8);
        let (result_tx, result_rx) = mpsc::sync_channel(1);
        let dispatcher = Dispatcher::new(
            RecordingTarget::default(),
            receiver,
            result_tx,
            Duration::from_millis(20),
            Arc::new(RecordingHealthReporter::default()),
        );
        let handle = dispatcher.spawn().expect("spawn dispatcher");
        for _ in 0..4 {
            sender
                .send(CommandEnvelope::from_tag("rx_list", None))
                .expect("enqueue");
        }
        thread::sleep(Duration::from_millis(50));
        sender.request_quit().expect("quit");

        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || done_tx.send(handle.join()));
        let joined = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("dispatcher exits without a reader");
        assert!(joined.is_ok());
        assert_eq!(result_rx.try_iter().count(), 1);
    }

    #[rstest]
    fn quit_answers_then_stops(mut harness: Harness) {
        harness.send("QUIT", &[]);
        let result = harness.next();
        assert_eq!(result.tag, "QUIT");
        assert_eq!(result.data, ResultData::Value(json!("SUCCESS")));

        let handle = harness.handle.take().expect("handle");
        handle.join().expect("dispatcher joins");
        assert!(harness.sender.is_closed());
        assert_eq!(harness.results.try_next(), None);
        assert_eq!(
            harness.reporter.events(),
            [HealthEvent::DispatcherStarted, HealthEvent::DispatcherStopped]
        );
    }
}
