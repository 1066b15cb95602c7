//! The weather server: accept loop and per-connection exchange.
use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};

use crate::{
    error::{Result, WeatherError},
    generator::WeatherSource,
    protocol::{Request, Response, Status, read_request, write_response},
    thread_pool::ThreadPool,
    validator::validate,
};

/// Time budget for a whole connection, from accept to close.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_ACCEPT_BACKOFF: Duration = Duration::from_secs(1);

/// Validate a request and, when it is acceptable, attach a fresh value.
///
/// Failures carry a null type and a zero value.
pub fn handle_request<S: WeatherSource>(request: &Request, source: &S) -> Response {
    let status = validate(request);
    match request.weather_type() {
        Some(kind) if status == Status::Success => Response::success(kind, source.generate(kind)),
        _ => Response::failure(status),
    }
}

/// Where one accepted connection is in its single exchange.
#[derive(Debug)]
enum Stage {
    Accepted,
    RequestReceived(Request),
    ResponseSent(Response),
    Failed(WeatherError),
}

/// Drive one exchange over `conn`: read a request, answer it once.
fn exchange<T, S>(conn: &mut T, peer: SocketAddr, source: &S) -> Result<Response>
where
    T: Read + Write,
    S: WeatherSource,
{
    let mut stage = Stage::Accepted;
    loop {
        debug!("{}: {:?}", peer, stage);
        stage = match stage {
            Stage::Accepted => match read_request(conn) {
                Ok(request) => Stage::RequestReceived(request),
                Err(e) => Stage::Failed(e),
            },
            Stage::RequestReceived(request) => {
                info!("Request '{}' from client ip {}", request, peer.ip());
                let response = handle_request(&request, source);
                match write_response(conn, &response) {
                    Ok(()) => Stage::ResponseSent(response),
                    Err(e) => Stage::Failed(e),
                }
            }
            Stage::ResponseSent(response) => return Ok(response),
            Stage::Failed(e) => return Err(e),
        };
    }
}

/// A stream whose every read and write is bounded by one absolute deadline.
///
/// Each call gets only the time left, so a peer trickling bytes cannot
/// stretch the connection past the deadline.
struct DeadlineStream<'a> {
    stream: &'a TcpStream,
    deadline: Instant,
}

impl DeadlineStream<'_> {
    fn remaining(&self) -> io::Result<Duration> {
        let left = self.deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection deadline passed",
            ));
        }
        Ok(left)
    }
}

impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.set_read_timeout(Some(self.remaining()?))?;
        let mut stream = self.stream;
        stream.read(buf)
    }
}

impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.set_write_timeout(Some(self.remaining()?))?;
        let mut stream = self.stream;
        stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}

/// Run one request/response exchange on `stream`, then close it.
///
/// Every read and write must finish before `deadline`. Returns the response
/// that was sent, or the I/O error that prevented it. The stream is closed
/// on both paths.
pub fn serve_connection<S: WeatherSource>(
    stream: TcpStream,
    source: &S,
    deadline: Instant,
) -> Result<Response> {
    let peer = stream.peer_addr()?;
    let outcome = stream
        .set_nonblocking(false)
        .map_err(WeatherError::from)
        .and_then(|()| {
            let mut conn = DeadlineStream {
                stream: &stream,
                deadline,
            };
            exchange(&mut conn, peer, source)
        });
    // the peer may already be gone, nothing left to report
    let _ = stream.shutdown(Shutdown::Both);
    debug!("{}: closed", peer);
    outcome
}

/// Growing pause between failed `accept()` calls.
struct AcceptBackoff {
    delay: Duration,
}

impl AcceptBackoff {
    fn new() -> Self {
        Self {
            delay: ACCEPT_POLL_INTERVAL,
        }
    }

    /// The pause to take now; the next one doubles up to the cap.
    fn failed(&mut self) -> Duration {
        let delay = self.delay;
        self.delay = (self.delay * 2).min(MAX_ACCEPT_BACKOFF);
        delay
    }

    fn reset(&mut self) {
        self.delay = ACCEPT_POLL_INTERVAL;
    }
}

/// Flag that stops a running [`WeatherServer`] from accepting.
#[derive(Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Ask the accept loop to stop. Connections already queued still finish.
    pub fn shutdown(&self) {
        info!("Shutting down server...");
        self.0.store(true, Ordering::Relaxed);
    }

    fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The weather server.
pub struct WeatherServer<S: WeatherSource, P: ThreadPool> {
    listener: TcpListener,
    pool: P,
    source: S,
    timeout: Duration,
    shutdown: ShutdownHandle,
}

impl<S: WeatherSource, P: ThreadPool> WeatherServer<S, P> {
    /// Bind `addr` and prepare to serve values from `source` on `pool`.
    pub fn new(addr: impl ToSocketAddrs, source: S, pool: P) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        // polled so that the shutdown flag is noticed
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            pool,
            source,
            timeout: DEFAULT_TIMEOUT,
            shutdown: ShutdownHandle::default(),
        })
    }

    /// Replace the per-connection time budget.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The address actually bound, useful when binding port 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle that can stop [`WeatherServer::run`] from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept connections until shut down, one exchange per connection.
    ///
    /// The deadline of a connection starts at accept, so time spent waiting
    /// for a free worker counts against it. Accept failures are logged and
    /// the loop keeps listening after a growing pause.
    pub fn run(&self) -> Result<()> {
        info!("Server started, waiting for connections...");
        let mut backoff = AcceptBackoff::new();

        while !self.shutdown.is_shutdown() {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    backoff.reset();
                    debug!("accepted connection from {}", addr);
                    let deadline = Instant::now() + self.timeout;
                    let source = self.source.clone();
                    self.pool.spawn(move || {
                        if let Err(e) = serve_connection(stream, &source, deadline) {
                            warn!("connection from {} abandoned: {}", addr, e);
                        }
                    });
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    let delay = backoff.failed();
                    error!("accept() failed: {}, retrying in {:?}", e, delay);
                    thread::sleep(delay);
                }
            }
        }

        info!("Server stopped accepting new connections");
        Ok(())
    }
}
