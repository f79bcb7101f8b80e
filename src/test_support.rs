//! Shared helpers for tests exercising real sockets.

use std::{
    io::{BufRead, BufReader, ErrorKind},
    net::{TcpListener, TcpStream},
    time::Duration,
};

const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Opens a connected loopback socket pair: (client side, server side).
pub fn tcp_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("loopback bind");
    let addr = listener.local_addr().expect("listener addr");
    let client = TcpStream::connect(addr).expect("loopback connect");
    let (server, _) = listener.accept().expect("loopback accept");
    (client, server)
}

/// Line-at-a-time reader with a short timeout, so a test asserting "nothing
/// arrives" finishes instead of hanging.
pub struct LineReader {
    reader: BufReader<TcpStream>,
}

impl LineReader {
    pub fn new(stream: TcpStream) -> Self {
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .expect("read timeout");
        Self {
            reader: BufReader::new(stream),
        }
    }

    /// Returns the next line without its terminator, or `None` on EOF or
    /// when nothing arrives within the timeout.
    pub fn next_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_owned()),
            Err(error)
                if error.kind() == ErrorKind::WouldBlock
                    || error.kind() == ErrorKind::TimedOut =>
            {
                None
            }
            Err(error) => panic!("test socket read failed: {error}"),
        }
    }
}
