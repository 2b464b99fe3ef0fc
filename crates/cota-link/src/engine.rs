//! The running engine: queues, dispatcher thread and auto-assignment.

use std::sync::{Arc, Mutex, PoisonError, mpsc};

use camino::Utf8Path;
use tracing::{info, warn};

use cota_config::Config;

use crate::auto_assign::{
    AutoAssignController, AutoAssignError, AutoAssignOutcome, LiveState, SharedWhitelist,
    Whitelist, WhitelistError, WhitelistLoad,
};
use crate::device::{Collaborators, Transmitter};
use crate::dispatch::{
    CommandSender, DispatchError, Dispatcher, DispatcherHandle, ResultReceiver, queue,
};
use crate::health::HealthReporter;
use crate::telemetry::TelemetryHandle;

const ENGINE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::engine");

/// Everything the engine shares between its threads.
///
/// Built once at startup. Producers clone the [`CommandSender`]; results are
/// read from the single [`ResultReceiver`].
#[derive(Debug)]
pub struct Engine {
    config: Config,
    _telemetry: TelemetryHandle,
    commands: CommandSender,
    results: ResultReceiver,
    dispatcher: Option<DispatcherHandle>,
    live: LiveState,
    whitelist: SharedWhitelist,
    auto_assign: AutoAssignController,
}

impl Engine {
    /// Creates the queues and starts the dispatcher thread.
    pub fn start(
        config: Config,
        telemetry: TelemetryHandle,
        reporter: Arc<dyn HealthReporter>,
        collaborators: Collaborators,
    ) -> Result<Self, DispatchError> {
        let (commands, receiver) = queue::command_queue(config.command_queue_capacity());
        let (result_tx, result_rx) = mpsc::sync_channel(config.result_queue_capacity());
        let live = LiveState::new();
        let whitelist: SharedWhitelist = Arc::new(Mutex::new(Whitelist::default()));

        let transmitter = Transmitter::new(&config, live.clone(), reporter.clone(), collaborators);
        let dispatcher = Dispatcher::new(
            transmitter,
            receiver,
            result_tx,
            config.dequeue_wait(),
            reporter,
        )
        .spawn()?;

        let auto_assign = AutoAssignController::new(
            Arc::clone(&whitelist),
            live.clone(),
            commands.clone(),
            config.auto_assign_interval(),
        );

        Ok(Self {
            results: ResultReceiver::new(result_rx, config.result_poll_interval()),
            config,
            _telemetry: telemetry,
            commands,
            dispatcher: Some(dispatcher),
            live,
            whitelist,
            auto_assign,
        })
    }

    /// The resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Producer handle for the command queue.
    #[must_use]
    pub const fn commands(&self) -> &CommandSender {
        &self.commands
    }

    /// The result stream.
    #[must_use]
    pub const fn results(&self) -> &ResultReceiver {
        &self.results
    }

    /// What the transmitter last reported about its receivers.
    #[must_use]
    pub const fn live(&self) -> &LiveState {
        &self.live
    }

    /// Number of receivers still waiting for a slot.
    #[must_use]
    pub fn pending_assignments(&self) -> usize {
        self.whitelist
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Replaces the whitelist with the contents of a CSV file.
    ///
    /// Malformed lines are skipped and returned in the load report.
    pub fn load_whitelist(&self, path: &Utf8Path) -> Result<WhitelistLoad, WhitelistError> {
        let load = Whitelist::load(path)?;
        for rejected in &load.rejected {
            warn!(target: ENGINE_TARGET, %rejected, "whitelist line skipped");
        }
        *self.whitelist.lock().unwrap_or_else(PoisonError::into_inner) = load.whitelist.clone();
        info!(target: ENGINE_TARGET, path = %path, entries = load.whitelist.len(), "whitelist loaded");
        Ok(load)
    }

    /// Starts assigning whitelisted receivers.
    pub fn start_auto_assign(&mut self) -> Result<(), AutoAssignError> {
        self.auto_assign.start()
    }

    /// Stops assignment, if running.
    pub fn stop_auto_assign(&mut self) -> Result<Option<AutoAssignOutcome>, AutoAssignError> {
        self.auto_assign.stop()
    }

    /// Returns true while the auto-assign worker runs.
    #[must_use]
    pub fn auto_assign_running(&self) -> bool {
        self.auto_assign.is_running()
    }

    /// Returns true once the dispatcher thread has exited.
    #[must_use]
    pub fn dispatcher_finished(&self) -> bool {
        self.dispatcher
            .as_ref()
            .is_none_or(DispatcherHandle::is_finished)
    }

    /// Asks the dispatcher to quit, stops auto-assignment and waits for both.
    ///
    /// The `QUIT` result stays in the result stream for the caller to read
    /// when the stream has room. Unread results never hold shutdown up.
    pub fn shutdown(mut self) -> Result<(), DispatchError> {
        self.halt()
    }

    fn halt(&mut self) -> Result<(), DispatchError> {
        let dispatcher = self.dispatcher.take();
        // The auto-assign worker can be blocked on a full queue until QUIT drains it.
        if dispatcher.is_some() && self.commands.request_quit().is_err() {
            info!(target: ENGINE_TARGET, "dispatcher already stopped");
        }
        if let Err(error) = self.auto_assign.stop() {
            warn!(target: ENGINE_TARGET, %error, "auto-assign worker ended abnormally");
        }
        dispatcher.map_or(Ok(()), DispatcherHandle::join)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(error) = self.halt() {
            warn!(target: ENGINE_TARGET, %error, "dispatcher ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::dispatch::{CommandEnvelope, CommandKind, ResultData, ResultEnvelope};
    use crate::tests::support::{FakeDevice, HealthEvent, RecordingHealthReporter};

    struct Running {
        engine: Engine,
        reporter: Arc<RecordingHealthReporter>,
    }

    impl Running {
        fn send(&self, envelope: CommandEnvelope) {
            self.engine.commands().send(envelope).expect("enqueue");
        }

        fn next(&self) -> ResultEnvelope {
            self.engine
                .results()
                .next_within(Duration::from_secs(5))
                .expect("result within deadline")
        }
    }

    #[fixture]
    fn running() -> Running {
        let config = Config {
            dequeue_wait_ms: 20,
            result_poll_interval_ms: 2,
            receive_timeout_ms: 300,
            auto_assign_interval_ms: 20,
            ..Config::default()
        };
        let reporter = Arc::new(RecordingHealthReporter::default());
        let engine = Engine::start(
            config,
            TelemetryHandle,
            reporter.clone(),
            Collaborators::default(),
        )
        .expect("engine starts");
        Running { engine, reporter }
    }

    #[rstest]
    fn commands_are_answered_in_order(running: Running) {
        let device = FakeDevice::orion();
        let commands = [
            CommandEnvelope::new(
                CommandKind::Connect,
                [json!("127.0.0.1"), json!(device.port())],
            ),
            CommandEnvelope::new(CommandKind::RegisterRx, [json!("0x1234")]),
            CommandEnvelope::quit(),
        ];
        // QUIT preempts queued work, so each command is answered before the next.
        let results: Vec<ResultEnvelope> = commands
            .into_iter()
            .map(|envelope| {
                running.send(envelope);
                running.next()
            })
            .collect();
        let tags: Vec<&str> = results.iter().map(|result| result.tag.as_str()).collect();
        assert_eq!(tags, ["CONNECT", "register_rx", "QUIT"]);
        assert_eq!(results[0].data, ResultData::Value(json!(true)));

        let Running { engine, reporter } = running;
        engine.shutdown().expect("shutdown");
        let events = reporter.events();
        assert!(events.contains(&HealthEvent::DispatcherStopped));
        assert!(events.contains(&HealthEvent::SessionConnected("127.0.0.1".to_owned())));
    }

    #[rstest]
    fn shutdown_leaves_the_quit_result(running: Running) {
        let Running { engine, .. } = running;
        let result = {
            let commands = engine.commands().clone();
            commands.request_quit().expect("quit");
            engine
                .results()
                .next_within(Duration::from_secs(5))
                .expect("quit result")
        };
        assert_eq!(result.tag, "QUIT");
        assert_eq!(result.data, ResultData::Value(json!("SUCCESS")));
        engine.shutdown().expect("shutdown");
    }

    #[test]
    fn shutdown_finishes_with_unread_results() {
        let config = Config {
            result_queue_capacity: 2,
            dequeue_wait_ms: 20,
            ..Config::default()
        };
        let engine = Engine::start(
            config,
            TelemetryHandle,
            Arc::new(RecordingHealthReporter::default()),
            Collaborators::default(),
        )
        .expect("engine starts");
        for _ in 0..5 {
            engine
                .commands()
                .send(CommandEnvelope::new(CommandKind::RxList, Vec::<serde_json::Value>::new()))
                .expect("enqueue");
        }
        std::thread::sleep(Duration::from_millis(50));

        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || done_tx.send(engine.shutdown().is_ok()));
        let finished = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("shutdown returns without reading results");
        assert!(finished);
    }

    #[rstest]
    fn whitelist_loads_replace_the_previous_contents(running: Running) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("whitelist.csv")).expect("utf8");
        std::fs::write(&path, "0x0A\n0x0B,2\n0x0C,two\n").expect("write");

        let load = running.engine.load_whitelist(&path).expect("load");
        assert_eq!(load.whitelist.len(), 2);
        assert_eq!(load.rejected.len(), 1);
        assert_eq!(running.engine.pending_assignments(), 2);

        std::fs::write(&path, "0x0D\n").expect("rewrite");
        running.engine.load_whitelist(&path).expect("reload");
        assert_eq!(running.engine.pending_assignments(), 1);
    }

    #[rstest]
    fn auto_assign_needs_a_whitelist(mut running: Running) {
        let error = running.engine.start_auto_assign().expect_err("empty");
        assert!(matches!(error, AutoAssignError::EmptyWhitelist));
        assert!(!running.engine.auto_assign_running());
    }

    #[rstest]
    fn auto_assign_stops_once_receivers_hold_slots(mut running: Running) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("whitelist.csv")).expect("utf8");
        std::fs::write(&path, "0x0A\n").expect("write");
        running.engine.load_whitelist(&path).expect("load");

        running
            .engine
            .live()
            .set_assigned(BTreeMap::from([(1, "0x0A".to_owned())]));
        running.engine.start_auto_assign().expect("start");
        let outcome = wait_for_outcome(&mut running.engine);
        assert_eq!(outcome, Some(AutoAssignOutcome::Completed));
        assert_eq!(running.engine.pending_assignments(), 0);
    }

    fn wait_for_outcome(engine: &mut Engine) -> Option<AutoAssignOutcome> {
        for _ in 0..200 {
            if !engine.auto_assign_running() {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        engine.stop_auto_assign().expect("stop")
    }
}
