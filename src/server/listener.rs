//! Accept loop: binds the relay port and spawns one session thread per
//! inbound connection.

use std::{
    net::TcpListener,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::{
    infra::error::AppError,
    server::{context::ServerContext, session::Session},
};

const ACCEPT_FAILED: &str = "ACCEPT_FAILED";
const SESSION_SPAWN_FAILED: &str = "SESSION_SPAWN_FAILED";

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shutdown switch handed to whoever needs to stop the accept loop.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    running: Arc<AtomicBool>,
}

impl ListenerHandle {
    /// Asks the accept loop to exit; it does so within one poll interval.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

pub struct Listener {
    listener: TcpListener,
    context: Arc<ServerContext>,
    running: Arc<AtomicBool>,
}

impl Listener {
    pub fn bind(host: &str, port: u16, context: Arc<ServerContext>) -> Result<Self, AppError> {
        let addr = format!("{host}:{port}");
        let listener = TcpListener::bind(&addr).map_err(|source| AppError::Bind {
            addr: addr.clone(),
            source,
        })?;
        // Non-blocking accept lets the loop notice a shutdown request.
        listener
            .set_nonblocking(true)
            .map_err(|source| AppError::Bind { addr, source })?;

        Ok(Self {
            listener,
            context,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            running: self.running.clone(),
        }
    }

    /// Runs the accept loop on the calling thread until shut down.
    pub fn run(self) {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(addr = %addr, "relay server listening");
        }

        while self.running.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    tracing::info!(peer = %addr, "client connected");

                    if let Err(error) = stream.set_nonblocking(false) {
                        tracing::warn!(peer = %addr, error = %error, "could not configure accepted socket");
                        continue;
                    }

                    match Session::new(stream, self.context.clone()) {
                        Ok(session) => {
                            let spawned = thread::Builder::new()
                                .name(format!("wren-session-{addr}"))
                                .spawn(move || session.run());
                            if let Err(error) = spawned {
                                tracing::warn!(
                                    code = SESSION_SPAWN_FAILED,
                                    peer = %addr,
                                    error = %error,
                                    "could not spawn session thread"
                                );
                            }
                        }
                        Err(error) => {
                            tracing::warn!(
                                code = SESSION_SPAWN_FAILED,
                                peer = %addr,
                                error = %error,
                                "could not set up session"
                            );
                        }
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(error) => {
                    tracing::warn!(code = ACCEPT_FAILED, error = %error, "accept failed");
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
            }
        }

        tracing::info!("relay server stopped");
    }
}
