use std::{
    fmt, io,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::{self, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;

use crate::{
    ClientStream, Config, Dialer, Error, Result,
    internal::{Acceptor, EventStream, Evaluator, Executor, Expectation, Session},
};

/// A scripted TCP server.
///
/// Declare what the server should observe and do, in order, then let the
/// code under test talk to it and call [`join`](Self::join) to find out
/// whether the conversation went as scripted.
///
/// Declarations are synchronous and return immediately; they run in the
/// background as the client makes progress. Each server accepts exactly one
/// client connection.
///
/// # Lifecycle
///
/// - [`start()`](Self::start) binds an OS-assigned port and starts the
///   background loops before returning, so the port is immediately dialable.
/// - [`join()`](Self::join) waits until every declaration made so far has
///   been processed and reports the first failure, once.
/// - [`stop()`](Self::stop) tears the server down. If no disconnect was
///   declared and nothing has failed yet, it first checks that the client
///   disconnected cleanly.
///
/// `MockServer` is a cheap handle; clones drive the same server.
///
/// # Example
///
/// ```rust,no_run
/// use mocktcp::{Config, MockServer};
/// use tokio::io::AsyncWriteExt;
///
/// # async fn run() -> mocktcp::Result {
/// let server = MockServer::start(Config::default()).await?;
/// server.expect_connect()?;
/// server.expect_bytes(b"Hello, world")?;
/// server.expect_disconnect()?;
///
/// let mut client = server.connect().await?;
/// client.write_all(b"Hello, world").await?;
/// client.close();
/// client.wait_closed().await?;
///
/// server.join().await?;
/// server.stop().await
/// # }
/// ```
#[derive(Clone)]
pub struct MockServer {
    inner: Arc<Inner>,
}

struct Inner {
    session: Arc<Session>,
    local_addr: SocketAddr,
    pending: mpsc::UnboundedSender<Arc<Expectation>>,
    declare_lock: Mutex<()>,
    tasks: sync::Mutex<JoinSet<()>>,
    cancel_token: CancellationToken,
}

impl MockServer {
    /// Bind a listener and start the acceptor, executor and evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IoError`] if the listener cannot be bound.
    pub async fn start(config: Config) -> Result<Self> {
        let listener = TcpListener::bind((config.bind_addr(), 0)).await?;
        let local_addr = listener.local_addr()?;
        let session = Arc::new(Session::new(local_addr.port(), config));

        let (pending_tx, pending_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        let mut tasks = JoinSet::new();
        tasks.spawn(
            Acceptor {
                listener,
                session: session.clone(),
                events: events_tx.clone(),
                cancel_token: cancel_token.child_token(),
            }
            .run(),
        );
        tasks.spawn(
            Executor {
                session: session.clone(),
                actions: actions_rx,
                events: events_tx,
                cancel_token: cancel_token.child_token(),
            }
            .run(),
        );
        tasks.spawn(
            Evaluator {
                session: session.clone(),
                pending: pending_rx,
                actions: actions_tx,
                events: EventStream::new(events_rx),
                cancel_token: cancel_token.child_token(),
            }
            .run(),
        );

        tracing::debug!(port = local_addr.port(), "mock server listening");

        Ok(Self {
            inner: Arc::new(Inner {
                session,
                local_addr,
                pending: pending_tx,
                declare_lock: Mutex::new(()),
                tasks: sync::Mutex::new(tasks),
                cancel_token,
            }),
        })
    }

    pub fn port(&self) -> u16 {
        self.inner.local_addr.port()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }

    pub fn config(&self) -> &Config {
        self.inner.session.config()
    }

    /// Expect a client to connect within the default timeout.
    pub fn expect_connect(&self) -> Result {
        self.expect_connect_within(self.default_timeout())
    }

    pub fn expect_connect_within(&self, timeout: Duration) -> Result {
        self.declare([Expectation::Connect { timeout }])
    }

    /// Expect the client to send exactly `data` next.
    pub fn expect_bytes(&self, data: impl AsRef<[u8]>) -> Result {
        self.expect_bytes_within(data, self.default_timeout())
    }

    pub fn expect_bytes_within(&self, data: impl AsRef<[u8]>, timeout: Duration) -> Result {
        self.declare([Expectation::Bytes {
            expected: Bytes::copy_from_slice(data.as_ref()),
            timeout,
        }])
    }

    /// Expect the client to send one length-prefixed frame carrying `payload`.
    pub fn expect_frame(&self, payload: impl AsRef<[u8]>) -> Result {
        self.expect_frame_within(payload, self.default_timeout())
    }

    pub fn expect_frame_within(&self, payload: impl AsRef<[u8]>, timeout: Duration) -> Result {
        self.declare([Expectation::Frame {
            expected: Bytes::copy_from_slice(payload.as_ref()),
            timeout,
        }])
    }

    /// Expect the client to disconnect cleanly.
    ///
    /// Checked in order: a client is connected; the client closes its side
    /// without sending anything more; it calls
    /// [`close`](ClientStream::close); it has read everything the server
    /// sent; it calls [`wait_closed`](ClientStream::wait_closed).
    pub fn expect_disconnect(&self) -> Result {
        self.expect_disconnect_within(self.default_timeout())
    }

    pub fn expect_disconnect_within(&self, timeout: Duration) -> Result {
        self.declare([
            Expectation::IsConnected,
            Expectation::ReadZero { timeout },
            Expectation::ClientClose { timeout },
            Expectation::AllSentRead,
            Expectation::ClientWaitClosed { timeout },
        ])?;
        self.inner.session.mark_disconnect_declared();
        Ok(())
    }

    /// Send `data` to the client as-is.
    pub fn send_bytes(&self, data: impl AsRef<[u8]>) -> Result {
        self.declare([Expectation::SendBytes(Bytes::copy_from_slice(data.as_ref()))])
    }

    /// Send `payload` to the client as one length-prefixed frame.
    pub fn send_frame(&self, payload: impl AsRef<[u8]>) -> Result {
        self.declare([Expectation::SendFrame(Bytes::copy_from_slice(
            payload.as_ref(),
        ))])
    }

    /// Close the server's writing side. The client reads end of stream.
    pub fn disconnect(&self) -> Result {
        self.declare([Expectation::Disconnect])
    }

    /// Wait until every declaration so far has been processed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unexpected`] with the first failed expectation. The
    /// failure is reported once; later calls return `Ok(())`.
    pub async fn join(&self) -> Result {
        let session = &self.inner.session;
        if session.join_failed() {
            return Ok(());
        }
        session.drained().await;
        match session.first_failure() {
            Some(failure) if !session.mark_join_failed() => {
                tracing::warn!(port = self.port(), %failure, "reporting failed expectation");
                Err(failure.into())
            }
            _ => Ok(()),
        }
    }

    /// Tear the server down.
    ///
    /// Unless a disconnect was declared or a failure has already been
    /// reported, declares [`expect_disconnect`](Self::expect_disconnect)
    /// first. Then joins, stops the background loops and closes the
    /// listener. Further declarations fail with [`Error::Stopped`].
    pub async fn stop(&self) -> Result {
        let session = &self.inner.session;
        let port = self.port();
        if !session.is_stopped() && !session.disconnect_declared() && !session.join_failed() {
            tracing::trace!(port, "declaring implicit disconnect");
            self.expect_disconnect()?;
        }
        let joined = self.join().await;

        {
            let _guard = self.declare_guard();
            session.mark_stopped();
        }
        self.inner.cancel_token.cancel();
        let mut tasks = self.inner.tasks.lock().await;
        while let Some(res) = tasks.join_next().await {
            match res {
                Err(e) if !e.is_cancelled() => {
                    tracing::error!(port, error = %e, "background task failed");
                    return Err(e.into());
                }
                _ => {}
            }
        }
        tracing::debug!(port, "mock server stopped");
        joined
    }

    /// Dial this server. The first stream dialed is instrumented.
    pub async fn connect(&self) -> io::Result<ClientStream> {
        let stream = TcpStream::connect(self.inner.local_addr).await?;
        let probe = self.inner.session.probe();
        let probe = probe.claim().then(|| probe.clone());
        Ok(ClientStream::new(stream, probe))
    }

    fn default_timeout(&self) -> Duration {
        self.config().default_timeout()
    }

    fn declare_guard(&self) -> MutexGuard<'_, ()> {
        self.inner
            .declare_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue `steps` back to back. No other declaration can interleave.
    fn declare<const N: usize>(&self, steps: [Expectation; N]) -> Result {
        let session = &self.inner.session;
        let _guard = self.declare_guard();
        if session.is_stopped() {
            return Err(Error::Stopped(self.port()));
        }
        session.begin_declarations(N);
        for (i, step) in steps.into_iter().enumerate() {
            tracing::trace!(port = self.port(), %step, "declared");
            if self.inner.pending.send(Arc::new(step)).is_err() {
                for _ in i..N {
                    session.finish_declaration();
                }
                return Err(Error::Stopped(self.port()));
            }
        }
        Ok(())
    }
}

impl Dialer for MockServer {
    async fn dial(&self, port: u16) -> io::Result<ClientStream> {
        if port != self.port() {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                Error::UnknownPort(port),
            ));
        }
        self.connect().await
    }
}

impl fmt::Debug for MockServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockServer")
            .field("local_addr", &self.inner.local_addr)
            .field("stopped", &self.inner.session.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}
