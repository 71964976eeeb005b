use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use bytes::{Bytes, BytesMut};
use tokio::{
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{self, MappedMutexGuard, mpsc::UnboundedSender, watch},
};

use crate::{Config, Event, Unexpected};

/// State shared by a server's handle and its three background loops.
///
/// The connected flag is raised while the connection slot is locked and
/// only after `Connected` has been pushed, so any action waiting for the
/// connection produces its event after `Connected`.
#[derive(Debug)]
pub(crate) struct Session {
    port: u16,
    config: Config,
    connected: watch::Sender<bool>,
    connection: sync::Mutex<Option<Connection>>,
    outstanding: watch::Sender<usize>,
    sent: Mutex<BytesMut>,
    errors: Mutex<Vec<Unexpected>>,
    stopped: AtomicBool,
    join_failed: AtomicBool,
    disconnect_declared: AtomicBool,
    probe: Arc<ClientProbe>,
}

/// The server side of the single accepted client connection.
#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) reader: OwnedReadHalf,
    /// `None` once the server has disconnected.
    pub(crate) writer: Option<OwnedWriteHalf>,
}

impl Session {
    pub(crate) fn new(port: u16, config: Config) -> Self {
        Self {
            port,
            config,
            connected: watch::Sender::new(false),
            connection: sync::Mutex::new(None),
            outstanding: watch::Sender::new(0),
            sent: Mutex::new(BytesMut::new()),
            errors: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            join_failed: AtomicBool::new(false),
            disconnect_declared: AtomicBool::new(false),
            probe: Arc::new(ClientProbe::default()),
        }
    }

    #[inline]
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    #[inline]
    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub(crate) fn probe(&self) -> &Arc<ClientProbe> {
        &self.probe
    }

    pub(crate) fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Store the first accepted stream and announce it on `events`.
    pub(crate) async fn attach(&self, stream: TcpStream, events: &UnboundedSender<Event>) {
        let (reader, writer) = stream.into_split();
        let mut slot = self.connection.lock().await;
        *slot = Some(Connection {
            reader,
            writer: Some(writer),
        });
        let _ = events.send(Event::Connected);
        self.connected.send_replace(true);
    }

    /// Wait until a client is attached, then lock its connection.
    ///
    /// Not bounded in time; callers wrap it in their own deadline.
    pub(crate) async fn connection(&self) -> Option<MappedMutexGuard<'_, Connection>> {
        self.connected.subscribe().wait_for(|c| *c).await.ok()?;
        sync::MutexGuard::try_map(self.connection.lock().await, Option::as_mut).ok()
    }

    /// Append to the ledger of bytes handed to the socket.
    pub(crate) fn record_sent(&self, data: &[u8]) {
        lock(&self.sent).extend_from_slice(data);
    }

    /// Bytes sent by the server that the client has not consumed yet.
    pub(crate) fn unread(&self) -> Bytes {
        let sent = lock(&self.sent);
        let consumed = self.probe.consumed();
        if consumed >= sent.len() {
            Bytes::new()
        } else {
            Bytes::copy_from_slice(&sent[consumed..])
        }
    }

    pub(crate) fn record_failure(&self, failure: Unexpected) {
        lock(&self.errors).push(failure);
    }

    pub(crate) fn has_failed(&self) -> bool {
        !lock(&self.errors).is_empty()
    }

    pub(crate) fn first_failure(&self) -> Option<Unexpected> {
        lock(&self.errors).first().cloned()
    }

    pub(crate) fn begin_declarations(&self, count: usize) {
        self.outstanding.send_modify(|n| *n += count);
    }

    pub(crate) fn finish_declaration(&self) {
        self.outstanding.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Resolve once every declared expectation has been processed.
    pub(crate) async fn drained(&self) {
        let _ = self.outstanding.subscribe().wait_for(|n| *n == 0).await;
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Returns whether a failure had already been reported by `join`.
    pub(crate) fn mark_join_failed(&self) -> bool {
        self.join_failed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn join_failed(&self) -> bool {
        self.join_failed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_disconnect_declared(&self) {
        self.disconnect_declared.store(true, Ordering::Release);
    }

    pub(crate) fn disconnect_declared(&self) -> bool {
        self.disconnect_declared.load(Ordering::Acquire)
    }
}

/// What the server can observe of the client side.
///
/// Only the first client stream dialed against a server reports here.
#[derive(Debug)]
pub(crate) struct ClientProbe {
    registered: AtomicBool,
    consumed: AtomicUsize,
    close_called: watch::Sender<bool>,
    wait_closed_called: watch::Sender<bool>,
}

impl Default for ClientProbe {
    fn default() -> Self {
        Self {
            registered: AtomicBool::new(false),
            consumed: AtomicUsize::new(0),
            close_called: watch::Sender::new(false),
            wait_closed_called: watch::Sender::new(false),
        }
    }
}

impl ClientProbe {
    /// Returns `true` for the first caller only.
    pub(crate) fn claim(&self) -> bool {
        !self.registered.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn credit(&self, n: usize) {
        self.consumed.fetch_add(n, Ordering::AcqRel);
    }

    pub(crate) fn consumed(&self) -> usize {
        self.consumed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_close_called(&self) {
        self.close_called.send_replace(true);
    }

    pub(crate) fn mark_wait_closed_called(&self) {
        self.wait_closed_called.send_replace(true);
    }

    pub(crate) async fn close_called(&self) {
        let _ = self.close_called.subscribe().wait_for(|c| *c).await;
    }

    pub(crate) async fn wait_closed_called(&self) {
        let _ = self.wait_closed_called.subscribe().wait_for(|c| *c).await;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
