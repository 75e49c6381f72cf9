//! Plain TCP backend (`tcp://host:port`).
//!
//! Name resolution and the connect run on a short-lived helper thread while
//! the worker polls the interrupt predicate. Reads use a short socket timeout
//! so a blocked read also wakes up every `poll_interval`.

use super::{interrupted, OpenRequest, StreamHandle, StreamIo};
use crate::error::StreamError;
use std::io::{self, Read};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

const CONNECT_THREAD_NAME: &str = "blockfeed-connect";

/// Connects to `host:port` and reads the raw byte stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpStreamIo;

impl StreamIo for TcpStreamIo {
    fn open(&self, request: &OpenRequest) -> io::Result<Box<dyn StreamHandle>> {
        if request.url.host_str().is_none() {
            return Err(invalid_address(request, "tcp url has no host"));
        }
        if request.url.port().is_none() {
            return Err(invalid_address(request, "tcp url has no port"));
        }

        let rw_timeout = request
            .options
            .rw_timeout()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let connect_timeout = rw_timeout.unwrap_or(request.connect_timeout);

        let url = request.url.clone();
        let stream = connect_interruptibly(request, move || {
            let addrs = url.socket_addrs(|| None)?;
            connect_any(&addrs, connect_timeout)
        })?;

        let poll = request.poll_interval.max(Duration::from_millis(1));
        stream.set_read_timeout(Some(poll))?;
        Ok(Box::new(TcpHandle {
            stream: Some(stream),
            request: request.clone(),
            rw_timeout,
        }))
    }
}

fn invalid_address(request: &OpenRequest, reason: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidInput,
        StreamError::InvalidAddress {
            address: request.url.to_string(),
            reason: reason.to_string(),
        },
    )
}

fn connect_any(addrs: &[SocketAddr], timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => {
                debug!(%addr, "Connected tcp stream");
                return Ok(stream);
            }
            Err(e) => {
                trace!(%addr, error = %e, "Connect attempt failed");
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved")))
}

/// Run `connect` on a helper thread and wait for it, polling the interrupt
/// predicate every `poll_interval`.
///
/// An interrupted attempt is abandoned: the helper thread exits once its own
/// connect returns and drops whatever it produced.
fn connect_interruptibly<T, F>(request: &OpenRequest, connect: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    if request.is_interrupted() {
        return Err(interrupted());
    }

    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name(CONNECT_THREAD_NAME.to_string())
        .spawn(move || {
            // Nobody is listening once the open was interrupted.
            let _ = tx.send(connect());
        })?;

    let poll = request.poll_interval.max(Duration::from_millis(1));
    loop {
        match rx.recv_timeout(poll) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if request.is_interrupted() {
                    debug!(url = %request.url, "Connect abandoned on interrupt");
                    return Err(interrupted());
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::other("connect thread exited without a result"));
            }
        }
    }
}

struct TcpHandle {
    stream: Option<TcpStream>,
    request: OpenRequest,
    rw_timeout: Option<Duration>,
}

impl StreamHandle for TcpHandle {
    fn read_partial(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "tcp stream closed"))?;
        let started = Instant::now();

        loop {
            if (self.request.interrupt)() {
                return Err(interrupted());
            }
            match stream.read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    if let Some(limit) = self.rw_timeout {
                        if started.elapsed() >= limit {
                            return Err(io::Error::new(
                                io::ErrorKind::TimedOut,
                                format!("no data for {limit:?}"),
                            ));
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.stream.take() {
            Some(stream) => match stream.shutdown(Shutdown::Both) {
                Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }
}
