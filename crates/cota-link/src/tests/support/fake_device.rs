//! Loopback transmitter used by session, dispatch and behaviour tests.
//!
//! The fake accepts connections sequentially, reassembles each unframed JSON
//! request, records it, and answers through a caller-supplied responder.

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{Value, json};

use crate::session::DocumentAccumulator;

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const CHUNK_PAUSE: Duration = Duration::from_millis(15);

/// How the fake answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Write one serialised document.
    Json(Value),
    /// Write the given pieces with a short pause between each.
    Chunks(Vec<String>),
    /// Write one document after a pause.
    Late(Duration, Value),
    /// Write nothing.
    Silent,
    /// Close the connection.
    Close,
}

impl Reply {
    pub fn json(value: Value) -> Self {
        Self::Json(value)
    }

    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Chunks(chunks.into_iter().map(Into::into).collect())
    }

    pub fn status(status: &str) -> Self {
        Self::Json(json!({"Result": {"Status": status}}))
    }
}

type Responder = dyn Fn(&Value) -> Reply + Send + Sync;

/// Extracts `Command.Type` from a request.
pub fn command_type(request: &Value) -> &str {
    request
        .get("Command")
        .and_then(|command| command.get("Type"))
        .and_then(Value::as_str)
        .unwrap_or_default()
}

/// Default Orion behaviour: answers the probe with a version and every other
/// request with `SUCCESS`.
pub fn orion_reply(request: &Value) -> Reply {
    match command_type(request) {
        "GetVersion" => Reply::json(json!({"Status": "OK", "Result": {"Version": "2.1.0"}})),
        _ => Reply::status("SUCCESS"),
    }
}

/// Default Venus behaviour: answers the probe without a version.
pub fn venus_reply(request: &Value) -> Reply {
    match command_type(request) {
        "GetVersion" => Reply::json(json!({"Status": "OK", "Result": {}})),
        "lpm_list" => Reply::json(json!({"Result": {"Status": "SUCCESS", "Slots": [{}]}})),
        _ => Reply::status("SUCCESS"),
    }
}

/// A transmitter listening on an ephemeral loopback port.
pub struct FakeDevice {
    address: SocketAddr,
    requests: Arc<Mutex<Vec<Value>>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FakeDevice {
    pub fn start<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fake device");
        listener
            .set_nonblocking(true)
            .expect("non-blocking listener");
        let address = listener.local_addr().expect("local address");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let responder: Arc<Responder> = Arc::new(responder);

        let handle = {
            let requests = Arc::clone(&requests);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || accept_loop(&listener, &requests, &shutdown, &*responder))
        };

        Self {
            address,
            requests,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn orion() -> Self {
        Self::start(orion_reply)
    }

    pub fn venus() -> Self {
        Self::start(venus_reply)
    }

    /// Returns a loopback port with nothing listening on it.
    pub fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
        listener.local_addr().expect("local address").port()
    }

    pub fn port(&self) -> u16 {
        self.address.port()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.requests.lock().expect("requests mutex").clone()
    }

    pub fn request_types(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|request| command_type(request).to_owned())
            .collect()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn accept_loop(
    listener: &TcpListener,
    requests: &Mutex<Vec<Value>>,
    shutdown: &AtomicBool,
    responder: &Responder,
) {
    while !shutdown.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => serve(stream, requests, shutdown, responder),
            Err(error) if error.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(_) => return,
        }
    }
}

fn serve(
    mut stream: TcpStream,
    requests: &Mutex<Vec<Value>>,
    shutdown: &AtomicBool,
    responder: &Responder,
) {
    stream.set_nonblocking(false).expect("blocking stream");
    stream
        .set_read_timeout(Some(POLL_INTERVAL))
        .expect("read timeout");
    let mut accumulator = DocumentAccumulator::default();
    let mut buffer = [0_u8; 4096];
    while !shutdown.load(Ordering::SeqCst) {
        let read = match stream.read(&mut buffer) {
            Ok(0) => return,
            Ok(read) => read,
            Err(error)
                if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                continue;
            }
            Err(_) => return,
        };
        let Some(request) = accumulator.push(&buffer[..read]) else {
            continue;
        };
        requests.lock().expect("requests mutex").push(request.clone());
        match responder(&request) {
            Reply::Json(value) => {
                if stream.write_all(value.to_string().as_bytes()).is_err() {
                    return;
                }
            }
            Reply::Chunks(chunks) => {
                for chunk in chunks {
                    if stream.write_all(chunk.as_bytes()).is_err() {
                        return;
                    }
                    let _ = stream.flush();
                    thread::sleep(CHUNK_PAUSE);
                }
            }
            Reply::Late(pause, value) => {
                thread::sleep(pause);
                if stream.write_all(value.to_string().as_bytes()).is_err() {
                    return;
                }
            }
            Reply::Silent => {}
            Reply::Close => return,
        }
    }
}
