//! Duplex wrapper around one TCP stream: bounded connect, a background
//! line-reader thread, a serialized writer, and idempotent disconnect.

use std::{
    io::{BufRead, BufReader, Write},
    net::{Shutdown, TcpStream, ToSocketAddrs},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use thiserror::Error;

const CONNECTION_READ_FAILED: &str = "CONNECTION_READ_FAILED";
const CONNECTION_READER_JOIN_FAILED: &str = "CONNECTION_READER_JOIN_FAILED";

/// Delivered to the connection's owner for every inbound line, plus one
/// terminal `Closed` when the stream dies underneath us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Line(String),
    Closed,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },
    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn connection reader: {0}")]
    ReaderSpawn(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SendError {
    #[error("not connected")]
    NotConnected,
    #[error("write failed: {0}")]
    Io(#[source] std::io::Error),
}

/// Anything that can push one protocol line toward the server. Lets the
/// use cases and the heartbeat run against a stub in tests.
pub trait LineSender {
    fn send_line(&self, line: &str) -> Result<(), SendError>;
}

struct Link {
    writer: TcpStream,
    reader: Option<JoinHandle<()>>,
    alive: Arc<AtomicBool>,
}

/// One client connection to the relay server.
///
/// All methods take `&self`; the active link lives behind a mutex, which is
/// also what serializes concurrent writers.
pub struct Connection {
    host: String,
    port: u16,
    connect_timeout: Duration,
    reconnect_backoff: Duration,
    event_tx: Sender<ConnectionEvent>,
    link: Mutex<Option<Link>>,
}

impl Connection {
    /// Opens a TCP stream within `connect_timeout` and starts the background
    /// reader. Inbound lines arrive on `event_tx`.
    pub fn connect(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
        reconnect_backoff: Duration,
        event_tx: Sender<ConnectionEvent>,
    ) -> Result<Self, ConnectError> {
        let connection = Self {
            host: host.into(),
            port,
            connect_timeout,
            reconnect_backoff,
            event_tx,
            link: Mutex::new(None),
        };
        connection.open_link()?;
        Ok(connection)
    }

    /// Writes one line atomically. The link mutex serializes concurrent
    /// callers so partial writes never interleave.
    pub fn send(&self, line: &str) -> Result<(), SendError> {
        let Ok(mut link) = self.link.lock() else {
            return Err(SendError::NotConnected);
        };
        let Some(active) = link.as_mut() else {
            return Err(SendError::NotConnected);
        };
        if !active.alive.load(Ordering::SeqCst) {
            return Err(SendError::NotConnected);
        }

        let framed = format!("{line}\n");
        active
            .writer
            .write_all(framed.as_bytes())
            .map_err(SendError::Io)
    }

    pub fn is_connected(&self) -> bool {
        self.link
            .lock()
            .ok()
            .and_then(|link| {
                link.as_ref()
                    .map(|active| active.alive.load(Ordering::SeqCst))
            })
            .unwrap_or(false)
    }

    /// Idempotent teardown: flips the liveness flag, shuts the socket both
    /// ways, and joins the reader. Safe from any thread, safe to call twice.
    pub fn disconnect(&self) {
        let link = match self.link.lock() {
            Ok(mut link) => link.take(),
            Err(_) => None,
        };
        let Some(mut link) = link else {
            return;
        };

        link.alive.store(false, Ordering::SeqCst);
        let _ = link.writer.shutdown(Shutdown::Both);

        if let Some(reader) = link.reader.take() {
            if reader.join().is_err() {
                tracing::warn!(
                    code = CONNECTION_READER_JOIN_FAILED,
                    "connection reader panicked during disconnect"
                );
            }
        }

        tracing::info!(host = %self.host, port = self.port, "disconnected from relay server");
    }

    /// Disconnect, wait the fixed backoff, then connect again with the same
    /// parameters. The caller re-authenticates and restarts its heartbeat.
    pub fn reconnect(&self) -> Result<(), ConnectError> {
        tracing::info!(host = %self.host, port = self.port, "attempting to reconnect");
        self.disconnect();
        thread::sleep(self.reconnect_backoff);
        self.open_link()
    }

    fn open_link(&self) -> Result<(), ConnectError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConnectError::Resolve {
                host: self.host.clone(),
                port: self.port,
            })?;

        let stream =
            TcpStream::connect_timeout(&addr, self.connect_timeout).map_err(|source| {
                ConnectError::Connect {
                    host: self.host.clone(),
                    port: self.port,
                    source,
                }
            })?;
        let read_stream = stream.try_clone().map_err(|source| ConnectError::Connect {
            host: self.host.clone(),
            port: self.port,
            source,
        })?;

        let alive = Arc::new(AtomicBool::new(true));
        let reader_alive = alive.clone();
        let event_tx = self.event_tx.clone();
        let reader = thread::Builder::new()
            .name("wren-connection-reader".to_owned())
            .spawn(move || run_reader(read_stream, event_tx, reader_alive))
            .map_err(ConnectError::ReaderSpawn)?;

        if let Ok(mut link) = self.link.lock() {
            *link = Some(Link {
                writer: stream,
                reader: Some(reader),
                alive,
            });
        }

        tracing::info!(host = %self.host, port = self.port, "connected to relay server");
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl LineSender for Connection {
    fn send_line(&self, line: &str) -> Result<(), SendError> {
        self.send(line)
    }
}

fn run_reader(stream: TcpStream, event_tx: Sender<ConnectionEvent>, alive: Arc<AtomicBool>) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end_matches(['\r', '\n']);
                if trimmed.is_empty() {
                    continue;
                }
                if event_tx
                    .send(ConnectionEvent::Line(trimmed.to_owned()))
                    .is_err()
                {
                    tracing::debug!("connection event consumer dropped; stopping reader");
                    break;
                }
            }
            Err(error) => {
                // Expected when disconnect() shuts the socket under us.
                if alive.load(Ordering::SeqCst) {
                    tracing::warn!(
                        code = CONNECTION_READ_FAILED,
                        error = %error,
                        "connection read failed"
                    );
                }
                break;
            }
        }
    }

    // Marks the connection dead exactly once; a deliberate disconnect has
    // already lowered the flag and suppresses the event.
    if alive.swap(false, Ordering::SeqCst) {
        let _ = event_tx.send(ConnectionEvent::Closed);
    }
}
